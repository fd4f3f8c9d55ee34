//! Tick engine (component D): two overflow-aware delay lists and the
//! per-tick draining that ages them.
//!
//! A delay keyed by absolute wake tick goes into whichever of the two lists
//! won't need re-keying when the tick counter wraps. The two list roles are
//! swapped by flipping a flag rather than rehashing every delayed task,
//! cheaper than a fixed-size tick wheel bucketed by modulo, which would
//! need every slot re-hashed on wraparound.

use crate::critical::{critical_section, is_isr_context, CriticalSection};
use crate::error::{KernelError, KernelResult};
use crate::list::remove_wherever;
use crate::sched::{self, Kernel};
use crate::stats;
use crate::task::Task;
use crate::types::{PendOutcome, TaskState, Tick};

/// Insert `task`'s delay node keyed by absolute wake tick, choosing the
/// overflowed or not-overflowed list depending on whether `tick + ticks`
/// wraps past zero.
pub(crate) fn insert_delay(kernel: &mut Kernel, task: &'static Task, ticks: Tick) {
    let wake = kernel.tick().wrapping_add(ticks);
    let list = if wake < kernel.tick() {
        kernel.overflowed()
    } else {
        kernel.not_overflowed()
    };
    unsafe { list.insert(task.delay_node(), wake) };
}

/// Cancel a pending delay, if any. A tolerant no-op when the task has no
/// delay node linked (it wasn't delayed, or the tick engine already removed
/// it).
pub(crate) fn cancel_delay(task: &'static Task) {
    unsafe { remove_wherever(task.delay_node()) };
}

/// One tick: bump the counter, flip the overflow lists on wrap, and drain
/// every delay whose deadline has arrived into `pending_ready`. Does not
/// itself decide whether to drain `pending_ready` into the ready table or
/// reschedule. The caller (`Tick`, or `SchedulerUnlock` replaying
/// `delayed_ticks`) does that once, after however many ticks it replays.
///
/// A drained delay node only re-queues its task if the task is still
/// actually blocked (`Delayed` or `PendingTimeout`). A task already moved
/// elsewhere left a stale delay node behind; requeuing it here would be a
/// spurious wake of an already-ready or already-running task.
pub(crate) fn advance_one(kernel: &mut Kernel, _cs: &CriticalSection) {
    let tick = kernel.tick().wrapping_add(1);
    kernel.set_tick(tick);
    if tick == 0 {
        kernel.swap_overflow_lists();
    }

    loop {
        let Some(head) = kernel.not_overflowed().head() else {
            break;
        };
        let due = unsafe { head.as_ref() }.key() <= tick;
        if !due {
            break;
        }

        let task_ptr = unsafe { head.as_ref() }.owner();
        let task = unsafe { task_ptr.as_ref() };

        unsafe { kernel.not_overflowed().remove(head) };

        if task.state().is_blocked() {
            unsafe { remove_wherever(task.event_node()) };
            if task.state() == TaskState::PendingTimeout {
                task.set_pend_outcome(PendOutcome::TimedOut);
            }
            kernel.mark_pending_ready(task);
        }
    }
}

/// `Tick()`: called from a timer ISR or a dedicated tick thread.
pub fn tick() {
    if !sched::is_running() {
        return;
    }

    critical_section(|cs| {
        let kernel = sched::kernel_get(cs);
        stats::on_tick();

        if kernel.scheduler_lock_nesting() > 0 {
            sched::record_delayed_tick(kernel);
            return;
        }

        advance_one(kernel, cs);
        sched::drain_and_maybe_schedule(kernel, cs);
    });
}

/// `TaskDelay(ticks)`: block the calling task for `ticks` ticks.
///
/// `ticks == 0` is a no-op that returns immediately without yielding;
/// see DESIGN.md for the rationale.
pub fn task_delay(ticks: Tick) -> KernelResult<()> {
    if !sched::is_running() {
        return Err(KernelError::NotRunning);
    }
    if is_isr_context() {
        return Err(KernelError::CalledFromIsr);
    }
    if ticks == 0 {
        return Ok(());
    }

    critical_section(|cs| {
        let kernel = sched::kernel_get(cs);
        let Some(current) = kernel.current() else {
            return Err(KernelError::NotRunning);
        };

        sched::ready_remove(kernel, current);
        current.set_state(TaskState::Delayed);
        insert_delay(kernel, current, ticks);
        sched::schedule(kernel, cs);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::{create_task, init, reset_for_test, start};

    #[test]
    fn delay_wraps_into_overflow_list_and_back() {
        reset_for_test();
        init().unwrap();

        static IDLE: Task = Task::new("idle", 0);
        static T: Task = Task::new("t", 1);
        create_task(&IDLE).unwrap();
        create_task(&T).unwrap();
        start().unwrap();

        critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            kernel.set_tick(0xFFFF_FFFE);
        });

        critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            sched::ready_remove(kernel, &T);
            T.set_state(TaskState::Delayed);
            insert_delay(kernel, &T, 3);
        });

        tick();
        tick();
        assert_eq!(T.state(), TaskState::Delayed);

        tick();
        assert_eq!(T.state(), TaskState::Ready);
    }
}
