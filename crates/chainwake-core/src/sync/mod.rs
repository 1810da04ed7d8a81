//! Synchronization primitives.
//!
//! The three-state spin word protecting the condvar's waiter list, the
//! paired futex [`Mutex`] with its [`MutexOps`] capability trait, the
//! [`Condvar`] itself, and the pure waiter-lifecycle contract model.

pub mod condvar;
pub mod contract;
pub mod mutex;
pub mod spin;

pub use condvar::{Condvar, WaitError};
pub use contract::{ClaimOutcome, SignalPlan, UnlinkOwner, WaiterPhase};
pub use mutex::{Mutex, MutexOps};
