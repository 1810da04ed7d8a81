//! Futex-backed condition variable with chained requeue wakeups.
//!
//! The condition variable pairs with any mutex whose waiter state is likewise
//! futex-backed (expressed through the [`MutexOps`] capability trait). Each
//! waiter blocks on a private per-call barrier futex; a signal releases only
//! the oldest claimed waiter, and every subsequent waiter is handed forward by
//! its predecessor with a futex requeue onto the mutex word. A broadcast
//! therefore wakes its waiters strictly one at a time, in FIFO order, without
//! stampeding the mutex.
//!
//! Layering, leaves first:
//! - [`syscall`]: raw Linux syscall stubs and the `futex`/`clock_gettime`
//!   entry points.
//! - [`errno`]: the error numbers those paths can observe.
//! - [`time`]: kernel timespecs and absolute monotonic [`Deadline`]s.
//! - [`futex`]: the three-primitive kernel contract (wait, wake, requeue).
//! - [`sync`]: the three-state spin word, the paired [`Mutex`], and the
//!   [`Condvar`] itself.

#![deny(unsafe_code)]

pub mod errno;
#[allow(unsafe_code)]
pub mod futex;
#[allow(unsafe_code)]
pub mod sync;
#[allow(unsafe_code)]
pub mod syscall;
#[allow(unsafe_code)]
pub mod time;

pub use sync::{Condvar, Mutex, MutexOps, WaitError};
pub use time::{Deadline, Timespec};
