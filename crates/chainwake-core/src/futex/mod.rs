//! Kernel futex primitives.
//!
//! The three operations the condition variable is built from: wait on a
//! 32-bit word, wake up to N sleepers, and atomically requeue sleepers from
//! one word to another. All operations are process-private and key on the
//! word's address; the kernel never dereferences the word outside the
//! initial value check, so a wake or requeue racing with the word's owner
//! returning is benign.
//!
//! Wait deadlines are absolute CLOCK_MONOTONIC instants expressed through
//! `FUTEX_WAIT_BITSET`, which accepts an absolute timespec directly; a null
//! timeout blocks forever.

use core::ptr;
use core::sync::atomic::AtomicU32;

use crate::errno;
use crate::syscall;
use crate::time::Deadline;

// ---------------------------------------------------------------------------
// Futex operation constants (Linux)
// ---------------------------------------------------------------------------

pub const FUTEX_WAIT: i32 = 0;
pub const FUTEX_WAKE: i32 = 1;
pub const FUTEX_CMP_REQUEUE: i32 = 4;
pub const FUTEX_WAIT_BITSET: i32 = 9;
pub const FUTEX_PRIVATE_FLAG: i32 = 0x80;
pub const FUTEX_CLOCK_REALTIME: i32 = 256;
pub const FUTEX_BITSET_MATCH_ANY: u32 = 0xFFFF_FFFF;

/// Sleep while `*word == expected`, until woken or `deadline` passes.
///
/// Returns `Ok(())` on wake and also when the word no longer held `expected`
/// at sleep time (the caller re-reads the word either way). `EINTR` is
/// retried internally; the deadline is absolute, so re-issuing the syscall
/// does not stretch the wait. Returns `Err(ETIMEDOUT)` once the deadline
/// passes. Any other errno is a programming bug surfaced to the caller.
pub fn wait(word: &AtomicU32, expected: u32, deadline: Deadline) -> Result<(), i32> {
    let ts = deadline.timespec();
    let timeout_ptr = match &ts {
        Some(ts) => ts as *const _ as usize,
        None => 0,
    };
    loop {
        // SAFETY: `word` is a live futex word for the duration of the call;
        // `timeout_ptr` is null or points at `ts`, which outlives the loop.
        let result = unsafe {
            syscall::sys_futex(
                word.as_ptr().cast_const(),
                FUTEX_WAIT_BITSET | FUTEX_PRIVATE_FLAG,
                expected,
                timeout_ptr,
                ptr::null(),
                FUTEX_BITSET_MATCH_ANY,
            )
        };
        match result {
            Ok(_) => return Ok(()),
            Err(e) if e == errno::EAGAIN => return Ok(()), // word already changed
            Err(e) if e == errno::EINTR => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Wake up to `count` sleepers on `word`. Returns the number woken.
///
/// Waking more sleepers than exist, or waking a word nobody sleeps on, is a
/// no-op; errors are not meaningful for an address-keyed wake and are
/// swallowed.
pub fn wake(word: &AtomicU32, count: u32) -> usize {
    // SAFETY: the wake keys on the word's address only.
    let result = unsafe {
        syscall::sys_futex(
            word.as_ptr().cast_const(),
            FUTEX_WAKE | FUTEX_PRIVATE_FLAG,
            count,
            0,
            ptr::null(),
            0,
        )
    };
    result.unwrap_or(0)
}

/// Atomically verify `*word == expected`, wake `wake_count` sleepers on
/// `word`, and move up to `requeue_count` of the remainder to `target`
/// without waking them. Returns the total woken plus requeued.
///
/// Fails with `EAGAIN` when the word no longer holds `expected`.
pub fn requeue(
    word: &AtomicU32,
    wake_count: u32,
    expected: u32,
    target: &AtomicU32,
    requeue_count: u32,
) -> Result<usize, i32> {
    // SAFETY: both words are live futex addresses; the kernel only compares
    // `*word` against `expected` and otherwise keys on the addresses.
    unsafe {
        syscall::sys_futex(
            word.as_ptr().cast_const(),
            FUTEX_CMP_REQUEUE | FUTEX_PRIVATE_FLAG,
            wake_count,
            requeue_count as usize,
            target.as_ptr().cast_const(),
            expected,
        )
    }
}
