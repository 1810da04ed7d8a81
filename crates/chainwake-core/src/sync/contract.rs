//! Pure model of the waiter-claim discipline.
//!
//! The futex condvar arbitrates every waiter through one `state` word; this
//! module pins that discipline as deterministic functions so the claim rules
//! and FIFO ordering are testable without threads. The threaded tests cover
//! the same properties against the real list and futex machinery.

/// Lifecycle phase of a waiter, as arbitrated by its `state` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterPhase {
    /// Queued and claimable.
    Waiting,
    /// Claimed by a signaller; part of a detached chain.
    Signaled,
    /// Timing out; will unlink itself.
    Leaving,
}

/// Which party owns unlinking a waiter after a claim attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOwner {
    /// The signaller detaches the node with its chain.
    Signaller,
    /// The waiter splices itself out and completes the notify handshake.
    Waiter,
}

/// Result of one claim attempt against a waiter's phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOutcome {
    /// Phase after the attempt.
    pub next: WaiterPhase,
    /// Whether the claimant won the word.
    pub claimed: bool,
    /// Who unlinks the node from here on.
    pub owner: UnlinkOwner,
}

/// A signaller's WAITING→SIGNALED claim.
///
/// Only a Waiting node can be claimed; a Leaving node belongs to its own
/// thread and the signaller must rendezvous with it instead. A Signaled
/// phase never appears on the list, so a claim against it is not modeled.
#[must_use]
pub const fn claim_for_signal(phase: WaiterPhase) -> ClaimOutcome {
    match phase {
        WaiterPhase::Waiting => ClaimOutcome {
            next: WaiterPhase::Signaled,
            claimed: true,
            owner: UnlinkOwner::Signaller,
        },
        WaiterPhase::Signaled => ClaimOutcome {
            next: WaiterPhase::Signaled,
            claimed: false,
            owner: UnlinkOwner::Signaller,
        },
        WaiterPhase::Leaving => ClaimOutcome {
            next: WaiterPhase::Leaving,
            claimed: false,
            owner: UnlinkOwner::Waiter,
        },
    }
}

/// A timing-out waiter's WAITING→LEAVING claim on its own word.
///
/// Losing means a signaller got there first: the waiter is in a chain and
/// must take the signalled path even though its deadline passed.
#[must_use]
pub const fn claim_for_timeout(phase: WaiterPhase) -> ClaimOutcome {
    match phase {
        WaiterPhase::Waiting => ClaimOutcome {
            next: WaiterPhase::Leaving,
            claimed: true,
            owner: UnlinkOwner::Waiter,
        },
        WaiterPhase::Signaled => ClaimOutcome {
            next: WaiterPhase::Signaled,
            claimed: false,
            owner: UnlinkOwner::Signaller,
        },
        WaiterPhase::Leaving => ClaimOutcome {
            next: WaiterPhase::Leaving,
            claimed: true,
            owner: UnlinkOwner::Waiter,
        },
    }
}

/// What one `signal(count)` call does to a queue of waiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalPlan {
    /// Indices claimed, oldest first.
    pub claimed: Vec<usize>,
    /// Index whose barrier the signaller releases directly (the oldest
    /// claimed; the rest are released by their predecessors).
    pub first_released: Option<usize>,
    /// Leaving indices the signaller must rendezvous with before releasing.
    pub awaited: Vec<usize>,
    /// Waiters left queued on the condvar afterwards.
    pub remaining: usize,
}

/// Plan a signal over `phases`, ordered oldest (tail) to newest (head).
///
/// Mirrors the real walk: visit from the oldest end while the budget lasts,
/// claim Waiting nodes, tag Leaving nodes, and leave everything past the
/// stop point queued. A negative `count` claims without budget (broadcast).
#[must_use]
pub fn plan_signal(phases: &[WaiterPhase], count: i32) -> SignalPlan {
    let mut claimed = Vec::new();
    let mut awaited = Vec::new();
    let mut budget = count;
    let mut visited = 0;

    for (i, phase) in phases.iter().enumerate() {
        if budget == 0 {
            break;
        }
        debug_assert!(
            !matches!(phase, WaiterPhase::Signaled),
            "a claimed waiter cannot still be queued"
        );
        visited = i + 1;
        match claim_for_signal(*phase) {
            ClaimOutcome { claimed: true, .. } => {
                claimed.push(i);
                budget -= 1;
            }
            ClaimOutcome {
                owner: UnlinkOwner::Waiter,
                ..
            } => awaited.push(i),
            ClaimOutcome { .. } => {}
        }
    }

    SignalPlan {
        first_released: claimed.first().copied(),
        claimed,
        awaited,
        remaining: phases.len() - visited,
    }
}
