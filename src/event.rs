//! Event object (component B). Rendezvous point every synchronization
//! primitive embeds, plus the pre-pend/pend/unblock protocol used to block
//! and wake tasks on it without losing a race against an interrupt.
//!
//! A single reusable wait-list object with an optional second list. Every
//! primitive here needs the same wait-list shape; only queue and fifo need
//! the second one.

use crate::config::CFG_PRIO_MAX;
use crate::critical::CriticalSection;
use crate::list::{remove_wherever, List};
use crate::sched::{self, Kernel};
use crate::task::Task;
use crate::tick;
use crate::types::{PendOutcome, Priority, TaskState, Tick, PEND_FOREVER, PEND_NON_BLOCKING};

/// Priority-ordered wait list(s) a primitive blocks tasks on.
///
/// Both lists are always present; unidirectional primitives (semaphore,
/// mutex) simply never touch `write_list`. Nodes are ordered highest
/// priority first by keying on an inverted priority so the underlying
/// non-decreasing-key `List` puts the highest-priority waiter at the head.
pub struct Event {
    read_list: List<Task>,
    write_list: List<Task>,
}

impl Event {
    /// `EventRInit`: read-list only (the write list stays empty and unused).
    pub const fn new_read_only() -> Self {
        Event {
            read_list: List::new(),
            write_list: List::new(),
        }
    }

    /// `EventRwInit`: both lists active, for bidirectional primitives.
    pub const fn new_read_write() -> Self {
        Self::new_read_only()
    }

    #[inline]
    pub(crate) fn read_list(&mut self) -> &mut List<Task> {
        &mut self.read_list
    }

    #[inline]
    pub(crate) fn write_list(&mut self) -> &mut List<Task> {
        &mut self.write_list
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new_read_only()
    }
}

/// Key a task's event-node insertion so that ascending-key order in `List`
/// produces descending-priority order in the wait list.
#[inline]
fn priority_key(priority: Priority) -> u32 {
    (CFG_PRIO_MAX as u32 - 1).saturating_sub(priority as u32)
}

/// `EventPrePendTask`: fast, unprotected phase. Inserts `task`'s event node
/// into `list`, ordered highest-priority-first. Must be called inside the
/// primitive's own interrupt-level critical section, before the blocking
/// decision is finalized. Lets a `Give` that lands before the task actually
/// blocks still find it.
pub(crate) fn pre_pend_task(list: &mut List<Task>, task: &'static Task) {
    unsafe { list.insert(task.event_node(), priority_key(task.priority())) };
}

/// `EventPendTask`: completes the block for a task already pre-pended into
/// one of the primitive's event lists by [`pre_pend_task`].
///
/// Re-checks node membership first: a `Give`/`Write`/`TaskResume` racing in
/// between the primitive's pre-pend critical section and this one may have
/// already moved the task to `pending_ready`. Detect that (the task's state
/// is already `PendingReady`) and skip blocking entirely, or a stale delay
/// node would get linked for a task that is already unblocked.
pub(crate) fn pend_task(
    kernel: &mut Kernel,
    task: &'static Task,
    ticks: Tick,
    cs: &CriticalSection,
) -> PendOutcome {
    kernel.enter_lock();

    if task.state() == TaskState::PendingReady {
        // Already unblocked by a concurrent Give/Write/TaskResume between
        // pre-pend and here. Nothing left to link.
    } else if ticks == PEND_FOREVER {
        task.set_state(TaskState::Pending);
    } else if ticks > PEND_NON_BLOCKING {
        task.set_state(TaskState::PendingTimeout);
        tick::insert_delay(kernel, task, ticks);
    } else {
        // ticks == 0 and the caller still pre-pended: treat as a no-op
        // block. Most primitives filter this case out before ever calling
        // pre-pend/pend.
        unsafe { remove_wherever(task.event_node()) };
    }

    sched::ready_remove(kernel, task);
    sched::schedule(kernel, cs);

    sched::exit_lock(kernel, cs);

    task.pend_outcome()
}

/// `EventUnblockTasks`: take the head (highest priority) waiter off `list`,
/// if any, and move it to `pending_ready`. Callable from interrupt context;
/// the caller is expected to already hold the interrupt-level critical
/// section, not merely the scheduler lock.
pub(crate) fn unblock_tasks(kernel: &mut Kernel, list: &mut List<Task>) -> Option<&'static Task> {
    let node = unsafe { list.pop_front() }?;
    let task_ptr = unsafe { node.as_ref() }.owner();
    let task = unsafe { task_ptr.as_ref() };

    tick::cancel_delay(task);
    task.set_pend_outcome(PendOutcome::Ok);
    kernel.mark_pending_ready(task);

    Some(task)
}

/// Fifo variant of `unblock_tasks`: only pop and wake the head waiter if
/// `threshold_met(task.wait_key())` holds for it. The byte FIFO uses this
/// to honor each waiter's requested byte count. A `Write` of N bytes may be
/// too small to satisfy the head-of-line reader even though the list is
/// non-empty, in which case nothing is woken.
pub(crate) fn unblock_head_if<F>(
    kernel: &mut Kernel,
    list: &mut List<Task>,
    threshold_met: F,
) -> Option<&'static Task>
where
    F: FnOnce(u32) -> bool,
{
    let head = list.head()?;
    let task_ptr = unsafe { head.as_ref() }.owner();
    let task = unsafe { task_ptr.as_ref() };

    if !threshold_met(task.wait_key()) {
        return None;
    }

    unsafe { list.remove(head) };
    tick::cancel_delay(task);
    task.set_pend_outcome(PendOutcome::Ok);
    kernel.mark_pending_ready(task);

    Some(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::critical::critical_section;
    use crate::sched::{create_task, init, reset_for_test, start};

    #[test]
    fn prepend_orders_by_priority_highest_first() {
        reset_for_test();
        init().unwrap();
        static IDLE: Task = Task::new("idle", 0);
        static LOW: Task = Task::new("low", 1);
        static MID: Task = Task::new("mid", 2);
        static HIGH: Task = Task::new("high", 3);
        create_task(&IDLE).unwrap();
        create_task(&LOW).unwrap();
        create_task(&MID).unwrap();
        create_task(&HIGH).unwrap();
        start().unwrap();

        let mut event = Event::new_read_only();
        pre_pend_task(event.read_list(), &LOW);
        pre_pend_task(event.read_list(), &HIGH);
        pre_pend_task(event.read_list(), &MID);

        let head = event.read_list().head().unwrap();
        let first = unsafe { head.as_ref() }.owner();
        assert_eq!(unsafe { first.as_ref() }.name(), "high");
    }

    #[test]
    fn unblock_wakes_highest_priority_waiter_and_cancels_its_timeout() {
        reset_for_test();
        init().unwrap();
        static IDLE: Task = Task::new("idle", 0);
        static LOW: Task = Task::new("low", 1);
        static HIGH: Task = Task::new("high", 2);
        create_task(&IDLE).unwrap();
        create_task(&LOW).unwrap();
        create_task(&HIGH).unwrap();
        start().unwrap();

        let mut event = Event::new_read_only();

        critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            pre_pend_task(event.read_list(), &LOW);
            pend_task(kernel, &LOW, PEND_FOREVER, cs);
            pre_pend_task(event.read_list(), &HIGH);
            pend_task(kernel, &HIGH, 50, cs);
        });

        assert_eq!(LOW.state(), TaskState::Pending);
        assert_eq!(HIGH.state(), TaskState::PendingTimeout);

        critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            let woken = unblock_tasks(kernel, event.read_list()).unwrap();
            assert_eq!(woken.name(), "high");
            sched::drain_and_maybe_schedule(kernel, cs);
        });

        assert_eq!(HIGH.state(), TaskState::Ready);
        assert_eq!(HIGH.pend_outcome(), PendOutcome::Ok);
        assert!(!unsafe { HIGH.delay_node().as_ref() }.is_linked());
        assert_eq!(LOW.state(), TaskState::Pending);
    }

    /// A task whose pre-pend is immediately followed by a concurrent
    /// unblock (an ISR `Give`/`Write` racing between the primitive's
    /// pre-pend and pend critical sections) must still pend correctly:
    /// no stale delay node gets linked, and the task ends up ready without
    /// ever having been "blocked".
    #[test]
    fn pend_after_concurrent_unblock_does_not_link_a_stale_delay() {
        reset_for_test();
        init().unwrap();
        static IDLE: Task = Task::new("idle", 0);
        static B: Task = Task::new("b", 1);
        create_task(&IDLE).unwrap();
        create_task(&B).unwrap();
        start().unwrap();

        let mut event = Event::new_read_only();

        critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            pre_pend_task(event.read_list(), &B);
            // An ISR's Give fires in the gap between pre-pend and pend.
            let woken = unblock_tasks(kernel, event.read_list()).unwrap();
            assert_eq!(woken.name(), "b");
            assert_eq!(B.state(), TaskState::PendingReady);

            // B's own pend call still runs with a finite timeout.
            pend_task(kernel, &B, 50, cs);
        });

        assert_eq!(B.state(), TaskState::Ready);
        assert_eq!(B.pend_outcome(), PendOutcome::Ok);
        assert!(!unsafe { B.delay_node().as_ref() }.is_linked());
        assert!(!unsafe { B.event_node().as_ref() }.is_linked());
        assert!(event.read_list().is_empty());
    }
}
