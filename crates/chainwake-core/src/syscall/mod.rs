//! Typed Linux syscall entry points.
//!
//! Wraps the raw trap stubs in `raw` and maps kernel returns in
//! `[-4095, -1]` to positive errno values. Only the two syscalls this crate
//! needs are exposed: `futex` and `clock_gettime`.

pub mod raw;

use crate::time::Timespec;

#[cfg(target_arch = "x86_64")]
const SYS_FUTEX: usize = 202;
#[cfg(target_arch = "aarch64")]
const SYS_FUTEX: usize = 98;

#[cfg(target_arch = "x86_64")]
const SYS_CLOCK_GETTIME: usize = 228;
#[cfg(target_arch = "aarch64")]
const SYS_CLOCK_GETTIME: usize = 113;

/// Largest errno value the kernel encodes in a return register.
const MAX_ERRNO: isize = 4095;

/// Map a raw kernel return register to `Ok(value)` or `Err(errno)`.
#[inline]
fn demux(ret: usize) -> Result<usize, i32> {
    let signed = ret as isize;
    if signed < 0 && signed >= -MAX_ERRNO {
        Err((-signed) as i32)
    } else {
        Ok(ret)
    }
}

/// `futex(2)`: operate on the 32-bit word at `uaddr`.
///
/// The fourth slot is the timeout pointer for wait operations and the requeue
/// count for `FUTEX_CMP_REQUEUE`, exactly as the kernel multiplexes it.
/// `uaddr2` and `val3` are only read for the operations that use them.
///
/// # Safety
///
/// `uaddr` (and `uaddr2` where the operation reads it) must be a valid,
/// aligned 32-bit futex word address. When the fourth slot carries a timeout
/// it must be null or point to a live `Timespec`.
pub unsafe fn sys_futex(
    uaddr: *const u32,
    op: i32,
    val: u32,
    timeout_or_count: usize,
    uaddr2: *const u32,
    val3: u32,
) -> Result<usize, i32> {
    // SAFETY: caller guarantees pointer validity; the syscall number and
    // argument layout match the kernel's futex entry point.
    let ret = unsafe {
        raw::syscall6(
            SYS_FUTEX,
            uaddr as usize,
            op as usize,
            val as usize,
            timeout_or_count,
            uaddr2 as usize,
            val3 as usize,
        )
    };
    demux(ret)
}

/// `clock_gettime(2)`: read `clock_id` into `ts`.
///
/// # Safety
///
/// `ts` must point to valid, writable memory for one `Timespec`.
pub unsafe fn sys_clock_gettime(clock_id: i32, ts: *mut Timespec) -> Result<(), i32> {
    // SAFETY: caller guarantees `ts` validity; clock ids are plain integers.
    let ret = unsafe { raw::syscall2(SYS_CLOCK_GETTIME, clock_id as usize, ts as usize) };
    demux(ret).map(|_| ())
}
