//! The paired futex mutex and its capability trait.
//!
//! The condvar is generic over the mutex it pairs with; [`MutexOps`] is the
//! full capability set it needs. The shipped [`Mutex`] is a three-state
//! futex mutex using the same word encoding as the spin module, so the
//! condvar's requeue handoff can land waiters directly on its word.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::sync::spin;

/// Capability surface a mutex must expose to pair with
/// [`Condvar`](crate::sync::Condvar).
///
/// The condvar calls these in a fixed discipline: `unlock` after enqueuing
/// its waiter, then exactly one of `lock` (timeout path) or
/// `lock_with_waiters` (signalled path) before returning, and it requeues
/// chained waiters onto `futex_word` before the eventual `unlock` wakes them.
pub trait MutexOps {
    /// The 32-bit futex word that backs the mutex. Requeued condvar waiters
    /// sleep here until an unlock wakes them.
    fn futex_word(&self) -> &AtomicU32;

    /// Unconditional lock. Returns an implementation-defined errno on
    /// failure; a failure is fatal to any condvar paired with this mutex.
    fn lock(&self) -> Result<(), i32>;

    /// Lock and fold `waiters_delta` into the mutex's waiter bookkeeping.
    ///
    /// A mutex that counts waiters adjusts its count by the delta. A mutex
    /// without a counter must instead end up in its locked-with-waiters
    /// state, so that its next unlock wakes a successor: there may be a
    /// requeued condvar waiter parked on the futex word that nothing else
    /// will ever wake.
    fn lock_with_waiters(&self, waiters_delta: i32) -> Result<(), i32>;

    /// Release the lock, waking or requeuing as the implementation chooses.
    fn unlock(&self);
}

/// Three-state futex mutex (0 unlocked, 1 locked, 2 locked with possible
/// waiters). No waiter counter; `lock_with_waiters` locks straight into the
/// contended state.
pub struct Mutex {
    word: AtomicU32,
}

impl Mutex {
    #[must_use]
    pub const fn new() -> Mutex {
        Mutex {
            word: AtomicU32::new(spin::UNLOCKED),
        }
    }

    /// Block until the lock is held.
    pub fn lock(&self) {
        spin::lock(&self.word);
    }

    /// Acquire without blocking. Returns false if the mutex was held.
    #[must_use]
    pub fn try_lock(&self) -> bool {
        self.word
            .compare_exchange(
                spin::UNLOCKED,
                spin::LOCKED_NO_WAITERS,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Release the lock. Wakes one parked thread if any were advertised.
    pub fn unlock(&self) {
        spin::unlock(&self.word);
    }
}

impl Default for Mutex {
    fn default() -> Mutex {
        Mutex::new()
    }
}

impl MutexOps for Mutex {
    fn futex_word(&self) -> &AtomicU32 {
        &self.word
    }

    fn lock(&self) -> Result<(), i32> {
        Mutex::lock(self);
        Ok(())
    }

    fn lock_with_waiters(&self, _waiters_delta: i32) -> Result<(), i32> {
        // No counter: take the lock directly into the contended state so the
        // next unlock wakes whoever was requeued onto the word.
        loop {
            if self
                .word
                .compare_exchange(
                    spin::UNLOCKED,
                    spin::LOCKED_MAYBE_WAITERS,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                )
                .is_ok()
            {
                return Ok(());
            }
            let _ = self.word.compare_exchange(
                spin::LOCKED_NO_WAITERS,
                spin::LOCKED_MAYBE_WAITERS,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            spin::wait(&self.word, spin::LOCKED_MAYBE_WAITERS);
        }
    }

    fn unlock(&self) {
        Mutex::unlock(self);
    }
}
