//! Error number definitions.
//!
//! The subset of `<errno.h>` values the futex and clock paths can observe,
//! plus the codes a paired mutex implementation is likely to report through
//! the condvar's error channel.

/// Interrupted system call.
pub const EINTR: i32 = 4;
/// Resource temporarily unavailable (futex word changed before sleeping).
pub const EAGAIN: i32 = 11;
/// Bad address.
pub const EFAULT: i32 = 14;
/// Invalid argument.
pub const EINVAL: i32 = 22;
/// Resource deadlock avoided.
pub const EDEADLK: i32 = 35;
/// Function not implemented.
pub const ENOSYS: i32 = 38;
/// Connection timed out (futex deadline expired).
pub const ETIMEDOUT: i32 = 110;

/// Returns a static message for the given errno value.
///
/// Unknown values get a generic message rather than a panic; the condvar
/// forwards mutex-supplied codes verbatim and cannot bound them.
#[must_use]
pub fn describe(errnum: i32) -> &'static str {
    match errnum {
        0 => "Success",
        EINTR => "Interrupted system call",
        EAGAIN => "Resource temporarily unavailable",
        EFAULT => "Bad address",
        EINVAL => "Invalid argument",
        EDEADLK => "Resource deadlock avoided",
        ENOSYS => "Function not implemented",
        ETIMEDOUT => "Connection timed out",
        _ => "Unknown error",
    }
}
