//! Compile-time configuration knobs.
//!
//! Flat `const` values, no builder/config-struct layer, matching the rest of
//! this crate's style.

use crate::types::Priority;

/// Number of priority levels. Priority indices run `0..MAX_PRIORITY`, higher
/// index is higher priority. Each level holds at most one task.
pub const CFG_PRIO_MAX: usize = 32;

/// Convenience alias used throughout the ready table and list code.
pub const MAX_PRIORITY: Priority = CFG_PRIO_MAX as Priority;

/// Lowest priority slot, reserved by convention for an idle task.
pub const CFG_PRIO_IDLE: Priority = 0;

/// Tick rate, used only by callers converting wall-clock delays to ticks.
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Whether a ready higher-priority task preempts the current one as soon as
/// it becomes ready (vs. only at the next voluntary reschedule point).
pub const CFG_PREEMPTION_EN: bool = true;

/// Preemption threshold. `0` means every higher-priority ready task preempts.
/// A nonzero value means only priorities strictly above the limit preempt;
/// tasks at or below the limit run cooperatively with respect to each other.
pub const CFG_PREEMPT_LIMIT: Priority = 0;

/// Whether the software timer task (component G) is compiled in.
pub const CFG_SOFTWARE_TIMERS_EN: bool = cfg!(feature = "softwaretimers");

/// Whether the thin statistics collaborator collects counters.
pub const CFG_STATISTICS_EN: bool = cfg!(feature = "statistics");

/// Whether the thin state-guard canary collaborator is active.
pub const CFG_STATE_GUARDS_EN: bool = cfg!(feature = "state-guards");

/// Maximum number of recursive `Lock` calls a single mutex owner may nest
/// before `count` would overflow. Matches the width of the counter field.
pub const CFG_MUTEX_MAX_RECURSION: u32 = u32::MAX;
