//! Futex-backed condition variable.
//!
//! Waiters queue on an intrusive doubly linked list of stack-allocated
//! nodes, guarded by a three-state spin word. Each node owns a private
//! barrier futex. A signal claims up to `n` of the oldest waiters with a
//! state CAS, detaches them from the list as one chain, and releases only
//! the oldest one's barrier; every claimed waiter then re-locks the paired
//! mutex and releases its successor with a futex requeue onto the mutex
//! word. Wakeups therefore reach the mutex one thread at a time, in FIFO
//! order, even on a broadcast.
//!
//! A timing-out waiter races the signaller for its own `state` word; the
//! winner of that CAS owns unlinking the node. A signaller that loses tags
//! the node with a rendezvous counter and does not return until the waiter
//! has unlinked itself, so no pointer into a waiter's stack frame outlives
//! the frame.

use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use crate::errno;
use crate::futex;
use crate::sync::mutex::MutexOps;
use crate::sync::spin;
use crate::syscall;
use crate::time::Deadline;

// ---------------------------------------------------------------------------
// Waiter states
// ---------------------------------------------------------------------------

/// Queued, claimable by a signaller.
const WAITING: u32 = 0;
/// Claimed by a signaller; part of a detached chain.
const SIGNALED: u32 = 1;
/// Timing out; the waiter owns unlinking itself.
const LEAVING: u32 = 2;

/// Per-call waiter record, allocated on the waiting thread's stack and
/// linked into the condvar while queued.
///
/// `prev`/`next` are null when unlinked or at an end of the list. The
/// barrier starts locked-with-waiters; whoever releases it (the signaller
/// for the oldest claimed node, the successor's requeue for the rest) is the
/// last writer this node sees from other threads, except for `notify`,
/// which a signaller writes after losing the `state` race.
struct Waiter {
    prev: AtomicPtr<Waiter>,
    next: AtomicPtr<Waiter>,
    state: AtomicU32,
    barrier: AtomicU32,
    notify: AtomicPtr<AtomicU32>,
}

impl Waiter {
    const fn new() -> Waiter {
        Waiter {
            prev: AtomicPtr::new(ptr::null_mut()),
            next: AtomicPtr::new(ptr::null_mut()),
            state: AtomicU32::new(WAITING),
            barrier: AtomicU32::new(spin::LOCKED_MAYBE_WAITERS),
            notify: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// Why a [`Condvar::timed_wait`] call did not return signalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The deadline passed before a signal claimed this waiter. The mutex is
    /// held again on return.
    TimedOut,
    /// The paired mutex failed to re-lock; carries the mutex
    /// implementation's errno. Whether the mutex is held is undefined, and
    /// the condvar pairing must be treated as wedged.
    BadState(i32),
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::TimedOut => f.write_str("deadline expired before a signal arrived"),
            WaitError::BadState(e) => {
                write!(f, "paired mutex failed to re-lock: {}", errno::describe(*e))
            }
        }
    }
}

impl std::error::Error for WaitError {}

/// Condition variable pairing with any [`MutexOps`] mutex.
///
/// New waiters are prepended at `head`; `tail` is the logically oldest
/// waiter, and signals claim from the tail, giving FIFO wakeup order.
/// Either both list pointers are null (empty) or both are non-null and the
/// links form one chain between them.
pub struct Condvar {
    lock: AtomicU32,
    head: AtomicPtr<Waiter>,
    tail: AtomicPtr<Waiter>,
}

impl Condvar {
    #[must_use]
    pub const fn new() -> Condvar {
        Condvar {
            lock: AtomicU32::new(spin::UNLOCKED),
            head: AtomicPtr::new(ptr::null_mut()),
            tail: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Release `mutex`, block until signalled or `deadline` passes, then
    /// re-acquire `mutex`.
    ///
    /// The caller must hold `mutex`. On `Ok` and on
    /// [`WaitError::TimedOut`] the mutex is held again when this returns;
    /// on [`WaitError::BadState`] the mutex failed to re-lock and its state
    /// is undefined. Callers re-check their predicate after any return.
    pub fn timed_wait<M: MutexOps>(
        &self,
        mutex: &M,
        deadline: Deadline,
    ) -> Result<(), WaitError> {
        let node = Waiter::new();
        let node_ptr = &node as *const Waiter as *mut Waiter;

        // Queue at head; head is the youngest end.
        spin::lock(&self.lock);
        let old_head = self.head.load(Ordering::SeqCst);
        node.next.store(old_head, Ordering::SeqCst);
        self.head.store(node_ptr, Ordering::SeqCst);
        if self.tail.load(Ordering::SeqCst).is_null() {
            self.tail.store(node_ptr, Ordering::SeqCst);
        } else {
            // SAFETY: a non-null tail means `old_head` is a live linked
            // waiter; the list lock is held.
            unsafe { (*old_head).prev.store(node_ptr, Ordering::SeqCst) };
        }
        spin::unlock(&self.lock);

        mutex.unlock();

        // Block on the barrier. Exits on: release by a signaller, release by
        // a successor's requeue followed by a mutex unlock, or the deadline.
        // Spurious wakes re-check the word and go back to sleep.
        loop {
            match futex::wait(&node.barrier, spin::LOCKED_MAYBE_WAITERS, deadline) {
                Err(e) if e == errno::ETIMEDOUT => break,
                _ => {
                    if node.barrier.load(Ordering::SeqCst) != spin::LOCKED_MAYBE_WAITERS {
                        break;
                    }
                }
            }
        }

        // The state CAS arbitrates the timeout/signal race: whoever moves
        // the word out of WAITING owns unlinking this node.
        if node
            .state
            .compare_exchange(WAITING, LEAVING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // Timed out unclaimed; splice the node out ourselves.
            spin::lock(&self.lock);
            let prev = node.prev.load(Ordering::SeqCst);
            let next = node.next.load(Ordering::SeqCst);
            if self.head.load(Ordering::SeqCst) == node_ptr {
                self.head.store(next, Ordering::SeqCst);
            } else if !prev.is_null() {
                // SAFETY: neighbors of a linked node are live while the
                // list lock is held.
                unsafe { (*prev).next.store(next, Ordering::SeqCst) };
            }
            if self.tail.load(Ordering::SeqCst) == node_ptr {
                self.tail.store(prev, Ordering::SeqCst);
            } else if !next.is_null() {
                // SAFETY: as above.
                unsafe { (*next).prev.store(prev, Ordering::SeqCst) };
            }
            spin::unlock(&self.lock);

            // A signaller that saw us LEAVING is parked on this counter and
            // must not proceed until we are off the list.
            let notify = node.notify.load(Ordering::SeqCst);
            if !notify.is_null() {
                // SAFETY: the signaller keeps the counter alive until it
                // reads zero, which cannot happen before this decrement.
                let remaining = unsafe { (*notify).fetch_sub(1, Ordering::SeqCst) };
                if remaining == 1 {
                    // The counter's owner may be asleep on it. The wake keys
                    // on the address only.
                    // SAFETY: plain futex wake, no dereference.
                    let _ = unsafe {
                        syscall::sys_futex(
                            notify.cast::<u32>().cast_const(),
                            futex::FUTEX_WAKE | futex::FUTEX_PRIVATE_FLAG,
                            1,
                            0,
                            ptr::null(),
                            0,
                        )
                    };
                }
            }

            // Plain lock: we were never claimed, so no requeue can have
            // parked us (or anyone on our behalf) on the mutex word.
            return match mutex.lock() {
                Ok(()) => Err(WaitError::TimedOut),
                Err(e) => Err(WaitError::BadState(e)),
            };
        }

        // Claimed by a signaller. Take our own barrier to serialize against
        // its release; from here the chain is detached from the condvar and
        // every timed-out node has removed itself, so prev/next are frozen
        // and safe to read without the list lock.
        spin::lock(&node.barrier);

        let prev = node.prev.load(Ordering::SeqCst);
        let next = node.next.load(Ordering::SeqCst);

        // Waiter accounting is folded in only at the two ends of the chain:
        // the youngest claims a slot on the mutex, the oldest gives back the
        // slot its requeue predecessor was already counted for.
        let mut waiters_delta = 0;
        if prev.is_null() {
            waiters_delta += 1;
        }
        if next.is_null() {
            waiters_delta -= 1;
        }

        let mut status = Ok(());
        if let Err(e) = mutex.lock_with_waiters(waiters_delta) {
            // Do not abort: the successor's barrier must still be released
            // below or the rest of the chain hangs forever.
            status = Err(WaitError::BadState(e));
        }

        if !prev.is_null() {
            // Hand the chain forward: release the successor's barrier and
            // migrate its sleeper onto the mutex word, where the eventual
            // mutex unlock wakes it.
            // SAFETY: `prev` stays blocked on its barrier until this call,
            // so the node is live; the trailing requeue keys on addresses.
            spin::unlock_requeue(unsafe { &(*prev).barrier }, mutex.futex_word());
        }

        status
    }

    /// Wake up to `count` waiters, oldest first; a negative `count` wakes
    /// all of them. Cannot fail; a no-op on an empty condvar.
    pub fn signal(&self, count: i32) {
        let mut n = count;
        let mut first: *mut Waiter = ptr::null_mut();
        // Rendezvous counter for waiters caught timing out; each decrements
        // it once it has unlinked itself.
        let pending = AtomicU32::new(0);

        spin::lock(&self.lock);

        let mut p = self.tail.load(Ordering::SeqCst);
        while n != 0 && !p.is_null() {
            // SAFETY: nodes reachable from tail are live and linked while
            // the list lock is held.
            let w = unsafe { &*p };
            if w.state
                .compare_exchange(WAITING, SIGNALED, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                n -= 1;
                if first.is_null() {
                    first = p;
                }
            } else {
                // Lost the state race: the waiter is timing out but cannot
                // unlink until we drop the list lock. Tag it and wait for it
                // after the split.
                pending.fetch_add(1, Ordering::SeqCst);
                w.notify.store(
                    &pending as *const AtomicU32 as *mut AtomicU32,
                    Ordering::SeqCst,
                );
            }
            p = w.prev.load(Ordering::SeqCst);
        }

        // Detach everything visited; `p` and younger stay queued.
        if !p.is_null() {
            // SAFETY: `p` is live and linked; the list lock is held.
            let keep = unsafe { &*p };
            let split = keep.next.load(Ordering::SeqCst);
            if !split.is_null() {
                // SAFETY: the oldest detached node is live until released.
                unsafe { (*split).prev.store(ptr::null_mut(), Ordering::SeqCst) };
            }
            keep.next.store(ptr::null_mut(), Ordering::SeqCst);
        } else {
            self.head.store(ptr::null_mut(), Ordering::SeqCst);
        }
        self.tail.store(p, Ordering::SeqCst);

        spin::unlock(&self.lock);

        // Every tagged waiter must finish unlinking before the chain runs;
        // their frames back the pointers inside the detached chain.
        loop {
            let cur = pending.load(Ordering::SeqCst);
            if cur == 0 {
                break;
            }
            spin::wait(&pending, cur);
        }

        if !first.is_null() {
            // SAFETY: the oldest claimed waiter stays blocked on its barrier
            // until this release; the trailing wake keys on the address.
            spin::unlock(unsafe { &(*first).barrier });
        }
    }

    /// Wake every queued waiter. Equivalent to `signal(-1)`.
    pub fn broadcast(&self) {
        self.signal(-1);
    }

    /// Number of waiters currently queued. A racing enqueue, signal, or
    /// timeout can change the count as soon as the list lock drops.
    #[must_use]
    pub fn waiters(&self) -> usize {
        let mut count = 0;
        spin::lock(&self.lock);
        let mut p = self.head.load(Ordering::SeqCst);
        while !p.is_null() {
            count += 1;
            // SAFETY: linked nodes are live while the list lock is held.
            p = unsafe { (*p).next.load(Ordering::SeqCst) };
        }
        spin::unlock(&self.lock);
        count
    }
}

impl Default for Condvar {
    fn default() -> Condvar {
        Condvar::new()
    }
}
