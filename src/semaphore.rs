//! Counting/binary semaphore (component F).
//!
//! Built on this crate's `Event`/pre-pend/pend/unblock protocol. The
//! handoff-over-increment behavior on `give` wakes a waiter directly instead
//! of bumping `count` then waking it, so a unit is never both counted and
//! handed off at once.

use crate::critical::{critical_section, is_isr_context, CsCell};
use crate::error::{KernelError, KernelResult};
use crate::event::{self, Event};
use crate::sched;
use crate::task::Task;
use crate::types::{Count, PendOutcome, Tick, PEND_NON_BLOCKING};

struct State {
    event: Event,
    count: Count,
    max: Count,
}

/// A counting semaphore; `max == 1` gives the usual binary semaphore.
pub struct Semaphore {
    state: CsCell<State>,
}

unsafe impl Sync for Semaphore {}

impl Semaphore {
    /// `SemaphoreInit(count, max)`.
    pub const fn new(count: Count, max: Count) -> Self {
        Semaphore {
            state: CsCell::new(State {
                event: Event::new_read_only(),
                count,
                max,
            }),
        }
    }

    /// Current count, read under the interrupt-level critical section.
    pub fn count(&self) -> Count {
        critical_section(|cs| self.state.get(cs).count)
    }

    /// `Take`: acquire one unit, blocking up to `ticks` if none is
    /// available. `ticks == 0` never blocks.
    pub fn take(&self, ticks: Tick) -> KernelResult<()> {
        if !sched::is_running() {
            return Err(KernelError::NotRunning);
        }
        if ticks != PEND_NON_BLOCKING && is_isr_context() {
            return Err(KernelError::CalledFromIsr);
        }

        let pending: Option<&'static Task> = critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            let state = self.state.get(cs);

            if state.count > 0 {
                state.count -= 1;
                return Ok(None);
            }

            if ticks == PEND_NON_BLOCKING {
                return Err(KernelError::WouldBlock);
            }

            let current = kernel.current().ok_or(KernelError::CalledFromIsr)?;
            event::pre_pend_task(state.event.read_list(), current);
            Ok(Some(current))
        })?;

        let Some(current) = pending else {
            return Ok(());
        };

        critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            event::pend_task(kernel, current, ticks, cs);
        });

        match current.pend_outcome() {
            PendOutcome::Ok => Ok(()),
            PendOutcome::TimedOut => Err(KernelError::TimedOut),
        }
    }

    /// `Give`: release one unit. Wakes the highest-priority waiter directly
    /// (count is not touched in that case; the unit is handed off, not
    /// produced) or, with no waiter, increments `count` up to `max`.
    pub fn give(&self) -> KernelResult<()> {
        critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            let state = self.state.get(cs);

            if event::unblock_tasks(kernel, state.event.read_list()).is_some() {
                sched::drain_if_unlocked(kernel, cs);
                return Ok(());
            }

            if state.count >= state.max {
                return Err(KernelError::CapacityExceeded);
            }
            state.count += 1;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::{create_task, init, reset_for_test, start};
    use crate::types::PEND_FOREVER;

    #[test]
    fn take_decrements_and_give_increments_within_bounds() {
        reset_for_test();
        init().unwrap();
        static IDLE: Task = Task::new("idle", 0);
        create_task(&IDLE).unwrap();
        start().unwrap();

        static SEM: Semaphore = Semaphore::new(1, 2);
        SEM.take(PEND_NON_BLOCKING).unwrap();
        assert_eq!(SEM.count(), 0);
        SEM.give().unwrap();
        SEM.give().unwrap();
        assert_eq!(SEM.count(), 2);
        assert_eq!(SEM.give(), Err(KernelError::CapacityExceeded));
    }

    #[test]
    fn take_would_block_when_empty_and_non_blocking() {
        reset_for_test();
        init().unwrap();
        static IDLE: Task = Task::new("idle", 0);
        create_task(&IDLE).unwrap();
        start().unwrap();

        static SEM: Semaphore = Semaphore::new(0, 1);
        assert_eq!(SEM.take(PEND_NON_BLOCKING), Err(KernelError::WouldBlock));
    }

    /// Task A takes-pend on an empty semaphore, task B gives; A must wake
    /// with success and the count must stay at zero (handoff, not an
    /// independent increment-then-decrement).
    #[test]
    fn rendezvous_hands_off_without_touching_count() {
        reset_for_test();
        init().unwrap();
        static IDLE: Task = Task::new("idle", 0);
        static A: Task = Task::new("a", 1);
        create_task(&IDLE).unwrap();
        create_task(&A).unwrap();
        start().unwrap();

        static SEM: Semaphore = Semaphore::new(0, 1);

        let pending = critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            let state = SEM.state.get(cs);
            assert_eq!(state.count, 0);
            let current = kernel.current().unwrap();
            event::pre_pend_task(state.event.read_list(), current);
            current
        });
        critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            event::pend_task(kernel, pending, PEND_FOREVER, cs);
        });
        assert_eq!(A.state(), crate::types::TaskState::Pending);

        SEM.give().unwrap();

        assert_eq!(A.state(), crate::types::TaskState::Ready);
        assert_eq!(A.pend_outcome(), PendOutcome::Ok);
        assert_eq!(SEM.count(), 0);
        assert!(!unsafe { A.event_node().as_ref() }.is_linked());
    }
}
