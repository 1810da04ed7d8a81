//! Monotonic time and wait deadlines.
//!
//! Kernel-ABI timespecs plus the [`Deadline`] type the futex wait paths take:
//! an absolute `CLOCK_MONOTONIC` instant, or infinite. Deadlines are absolute
//! so a wait loop can re-issue the same deadline after a spurious wake
//! without drift, and monotonic so a wall-clock jump cannot move a blocked
//! waiter's expiry.

use core::time::Duration;

use crate::syscall;

/// Use CLOCK_REALTIME for `clock_gettime`.
pub const CLOCK_REALTIME: i32 = 0;
/// Use CLOCK_MONOTONIC for `clock_gettime` and futex deadlines.
pub const CLOCK_MONOTONIC: i32 = 1;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Represents a kernel timespec value (seconds + nanoseconds).
///
/// Layout matches `struct timespec` on Linux x86_64/aarch64 (two i64 words),
/// so a reference can be passed straight to the futex timeout slot.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timespec {
    /// Seconds.
    pub tv_sec: i64,
    /// Nanoseconds (0 to 999_999_999).
    pub tv_nsec: i64,
}

impl Timespec {
    /// Build a timespec without normalizing.
    #[must_use]
    pub const fn new(tv_sec: i64, tv_nsec: i64) -> Self {
        Timespec { tv_sec, tv_nsec }
    }

    /// Returns true when the nanosecond field is in [0, 999_999_999].
    #[must_use]
    pub const fn valid_nsec(&self) -> bool {
        self.tv_nsec >= 0 && self.tv_nsec < NANOS_PER_SEC
    }

    /// Total nanoseconds since the clock's epoch.
    #[must_use]
    pub const fn as_nanos(&self) -> i128 {
        self.tv_sec as i128 * NANOS_PER_SEC as i128 + self.tv_nsec as i128
    }

    /// Add a duration, keeping the nanosecond field normalized.
    /// Saturates on seconds overflow.
    #[must_use]
    pub fn add_duration(self, dur: Duration) -> Timespec {
        let mut sec = self.tv_sec.saturating_add(dur.as_secs() as i64);
        let mut nsec = self.tv_nsec + i64::from(dur.subsec_nanos());
        if nsec >= NANOS_PER_SEC {
            nsec -= NANOS_PER_SEC;
            sec = sec.saturating_add(1);
        }
        Timespec {
            tv_sec: sec,
            tv_nsec: nsec,
        }
    }
}

/// Read CLOCK_MONOTONIC.
///
/// `clock_gettime` cannot fail for a known clock and a valid output pointer;
/// the unreachable error arm degrades to the epoch, which turns any deadline
/// built from it into an already-expired one rather than an unbounded wait.
#[must_use]
pub fn monotonic_now() -> Timespec {
    let mut ts = Timespec::default();
    // SAFETY: `ts` is a live, writable Timespec; CLOCK_MONOTONIC is valid.
    match unsafe { syscall::sys_clock_gettime(CLOCK_MONOTONIC, &mut ts) } {
        Ok(()) => ts,
        Err(_) => Timespec::default(),
    }
}

/// An absolute CLOCK_MONOTONIC expiry for a blocking wait, or infinite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Timespec>);

impl Deadline {
    /// Never expires.
    pub const INFINITE: Deadline = Deadline(None);

    /// Expire at an absolute CLOCK_MONOTONIC instant.
    ///
    /// The instant must be a kernel-valid timespec (non-negative seconds,
    /// normalized nanoseconds), or the futex wait will reject it.
    #[must_use]
    pub const fn at(ts: Timespec) -> Deadline {
        debug_assert!(ts.tv_sec >= 0 && ts.valid_nsec());
        Deadline(Some(ts))
    }

    /// Expire `dur` from now.
    #[must_use]
    pub fn after(dur: Duration) -> Deadline {
        Deadline(Some(monotonic_now().add_duration(dur)))
    }

    /// True for [`Deadline::INFINITE`].
    #[must_use]
    pub const fn is_infinite(&self) -> bool {
        self.0.is_none()
    }

    /// The absolute expiry, or `None` for infinite.
    #[must_use]
    pub const fn timespec(&self) -> Option<Timespec> {
        self.0
    }
}
