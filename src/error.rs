//! Kernel error taxonomy.
//!
//! A single flat `#[repr(u16)]` enum with a `KernelResult<T>` alias, in the
//! same hand-rolled style as the rest of this crate. No `anyhow`, no
//! `thiserror`.

/// Everything a kernel operation can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum KernelError {
    /// Resource unavailable and the caller asked not to block.
    WouldBlock = 1,
    /// Pend expired before the condition was met. Deliberately reported the
    /// same way as `WouldBlock` would be by a caller that only checks
    /// success/failure. The timeout value came from the caller.
    TimedOut,
    /// Queue/FIFO write with no room, or semaphore `Give` already at max.
    CapacityExceeded,
    /// Task creation named a priority outside `0..MAX_PRIORITY`.
    InvalidPriority,
    /// Task creation named a priority slot already occupied.
    DuplicatePriority,
    /// Called from interrupt context where only task context is valid.
    CalledFromIsr,
    /// Called before `Init`/`Start`, or after kernel shutdown.
    NotRunning,
    /// Scheduler lock nesting counter would overflow or underflow.
    LockNestingError,
}

pub type KernelResult<T> = Result<T, KernelError>;
