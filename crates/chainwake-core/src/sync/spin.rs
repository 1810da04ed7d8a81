//! Three-state futex word lock.
//!
//! The lock word that guards the condvar's waiter list, and the state
//! encoding shared by every barrier and mutex word in this crate:
//! 0 = unlocked, 1 = locked with no waiters, 2 = locked with possible
//! waiters. The bounded spin amortizes the short critical sections the
//! condvar holds this lock for; the futex park behind it tolerates spurious
//! wakes by re-checking the word.
//!
//! The futex syscalls behind [`unlock`] and [`unlock_requeue`] key on the
//! word's address and never load through it, so they may race with the
//! released word's owner returning (a stack barrier word dying) without harm.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::futex;
use crate::time::Deadline;

pub const UNLOCKED: u32 = 0;
pub const LOCKED_NO_WAITERS: u32 = 1;
pub const LOCKED_MAYBE_WAITERS: u32 = 2;

/// Bounded spin iterations before parking. Tuning knob, not contract.
const SPIN_LIMIT: u32 = 100;

/// Spin briefly, then park on the futex, while `*word == current`.
pub fn wait(word: &AtomicU32, current: u32) {
    let mut spins = SPIN_LIMIT;
    while spins > 0 {
        if word.load(Ordering::SeqCst) == current {
            core::hint::spin_loop();
            spins -= 1;
        } else {
            return;
        }
    }
    while word.load(Ordering::SeqCst) == current {
        let _ = futex::wait(word, current, Deadline::INFINITE);
    }
}

/// Acquire the word.
pub fn lock(word: &AtomicU32) {
    if word
        .compare_exchange(
            UNLOCKED,
            LOCKED_NO_WAITERS,
            Ordering::SeqCst,
            Ordering::SeqCst,
        )
        .is_ok()
    {
        return;
    }
    // Contended: advertise a possible waiter, then park until the word frees
    // and we win the reacquire race.
    let _ = word.compare_exchange(
        LOCKED_NO_WAITERS,
        LOCKED_MAYBE_WAITERS,
        Ordering::SeqCst,
        Ordering::SeqCst,
    );
    loop {
        wait(word, LOCKED_MAYBE_WAITERS);
        if word
            .compare_exchange(
                UNLOCKED,
                LOCKED_MAYBE_WAITERS,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            return;
        }
    }
}

/// Release the word, waking one parked waiter if any were advertised.
pub fn unlock(word: &AtomicU32) {
    if word.swap(UNLOCKED, Ordering::SeqCst) == LOCKED_MAYBE_WAITERS {
        futex::wake(word, 1);
    }
}

/// Release the word and migrate one parked waiter to `target` unwoken.
///
/// The requeue verifies the word still reads UNLOCKED (we just stored it),
/// wakes nobody on `word`, and moves at most one sleeper. The migrated
/// thread is woken later by whatever wakes `target`; for the condvar chain
/// that is the paired mutex's unlock.
pub fn unlock_requeue(word: &AtomicU32, target: &AtomicU32) {
    word.store(UNLOCKED, Ordering::SeqCst);
    let _ = futex::requeue(word, 0, UNLOCKED, target, 1);
}
