//! Shared type aliases and small enums used across the kernel core.

/// Index into the ready-slot table. `0` is lowest priority.
pub type Priority = u8;

/// Monotonic tick counter width.
pub type Tick = u32;

/// Semaphore / mutex recursion counter width.
pub type Count = u32;

/// A pend timeout, in ticks. `0` means "don't block"; `Tick::MAX` means
/// "block forever" (suspend).
pub const PEND_FOREVER: Tick = Tick::MAX;
pub const PEND_NON_BLOCKING: Tick = 0;

/// Lifecycle/blocking state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Occupies its ready slot, eligible for selection.
    Ready,
    /// Blocked in `TaskDelay`, parked only in a delay list.
    Delayed,
    /// Blocked on a primitive's event list with no timeout.
    Pending,
    /// Blocked on a primitive's event list with a timeout, parked in both
    /// the event list and a delay list.
    PendingTimeout,
    /// Unblocked (by tick expiry, `Give`, or `TaskResume`) but not yet
    /// drained from `pending_ready` into its ready slot.
    PendingReady,
}

impl TaskState {
    #[inline]
    pub fn is_blocked(self) -> bool {
        matches!(
            self,
            TaskState::Delayed | TaskState::Pending | TaskState::PendingTimeout
        )
    }
}

/// Outcome recorded on a task when it is unblocked, read back once the task
/// resumes running inside the primitive that parked it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendOutcome {
    /// Woken by a matching `Give`/`Write`/`Unlock`/`TaskResume`.
    Ok,
    /// Woken by the tick engine; the deadline passed with no unblock.
    TimedOut,
}
