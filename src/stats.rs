//! Thin statistics collaborator.
//!
//! Kept outside the scheduling/blocking core: a handful of counters, no-ops
//! when `CFG_STATISTICS_EN` is off. Modeled as observer hooks called from
//! the core's own documented seams (task create, tick processing, context
//! switch) rather than woven into the core's control flow.

use portable_atomic::{AtomicU32, Ordering};

use crate::config::CFG_STATISTICS_EN;

struct Counters {
    context_switches: AtomicU32,
    ticks_processed: AtomicU32,
    tasks_created: AtomicU32,
}

impl Counters {
    const fn new() -> Self {
        Self {
            context_switches: AtomicU32::new(0),
            ticks_processed: AtomicU32::new(0),
            tasks_created: AtomicU32::new(0),
        }
    }
}

static COUNTERS: Counters = Counters::new();

#[inline]
pub fn on_context_switch() {
    if CFG_STATISTICS_EN {
        COUNTERS.context_switches.fetch_add(1, Ordering::Relaxed);
    }
}

#[inline]
pub fn on_tick() {
    if CFG_STATISTICS_EN {
        COUNTERS.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }
}

#[inline]
pub fn on_task_created() {
    if CFG_STATISTICS_EN {
        COUNTERS.tasks_created.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of current counters, `0` in every field when statistics are
/// compiled out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Snapshot {
    pub context_switches: u32,
    pub ticks_processed: u32,
    pub tasks_created: u32,
}

pub fn snapshot() -> Snapshot {
    if !CFG_STATISTICS_EN {
        return Snapshot::default();
    }
    Snapshot {
        context_switches: COUNTERS.context_switches.load(Ordering::Relaxed),
        ticks_processed: COUNTERS.ticks_processed.load(Ordering::Relaxed),
        tasks_created: COUNTERS.tasks_created.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_back_whatever_was_recorded() {
        on_tick();
        on_tick();
        on_task_created();
        let snap = snapshot();
        if CFG_STATISTICS_EN {
            assert!(snap.ticks_processed >= 2);
            assert!(snap.tasks_created >= 1);
        } else {
            assert_eq!(snap.ticks_processed, 0);
        }
    }
}
