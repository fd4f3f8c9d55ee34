//! Scheduler (component E): the scheduler-state singleton, the lock-nesting
//! counter, pending-ready draining, preemption policy, selection, and the
//! `Init`/`Start` lifecycle.
//!
//! The `ready[]` table is a flat one-task-per-priority array rather than a
//! set of per-priority linked lists, which removes the need for a separate
//! priority bitmap and per-priority ready list.

use core::ptr::NonNull;

use portable_atomic::{AtomicBool, Ordering};

use crate::config::{CFG_PREEMPT_LIMIT, CFG_PREEMPTION_EN, CFG_PRIO_MAX};
use crate::critical::{critical_section, CriticalSection, CsCell};
use crate::error::{KernelError, KernelResult};
use crate::list::List;
use crate::state_guard::StateGuard;
use crate::task::Task;
use crate::types::{Priority, TaskState};
use crate::{port, stats};

#[cfg(feature = "softwaretimers")]
use crate::timer::Timer;

/// Lock-free flags checked before the CS-protected singleton is ever
/// touched.
struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    #[inline]
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    #[inline]
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

static FLAGS: KernelFlags = KernelFlags::new();

/// The process-wide scheduler-state singleton.
pub(crate) struct Kernel {
    ready: [Option<NonNull<Task>>; CFG_PRIO_MAX],
    current: Option<NonNull<Task>>,
    scheduler_lock: u32,
    higher_priority_ready: bool,
    tick: u32,
    delayed_ticks: u32,
    list_a: List<Task>,
    list_b: List<Task>,
    /// `true` when `list_b` is the overflowed list; swapped on tick wrap.
    overflowed_is_b: bool,
    pending_ready: List<Task>,
    #[cfg(feature = "softwaretimers")]
    pub(crate) timer_list: List<Timer>,
    #[cfg(feature = "softwaretimers")]
    pub(crate) timer_unordered_list: List<Timer>,
    #[cfg(feature = "softwaretimers")]
    pub(crate) task_timer_last_run: u32,
}

// Always accessed either by the single running task or under the
// interrupt-level critical section held via `CsCell`; see `crate::critical`.
unsafe impl Send for Kernel {}

impl Kernel {
    const fn new() -> Self {
        Kernel {
            ready: [None; CFG_PRIO_MAX],
            current: None,
            scheduler_lock: 0,
            higher_priority_ready: false,
            tick: 0,
            delayed_ticks: 0,
            list_a: List::new(),
            list_b: List::new(),
            overflowed_is_b: false,
            pending_ready: List::new(),
            #[cfg(feature = "softwaretimers")]
            timer_list: List::new(),
            #[cfg(feature = "softwaretimers")]
            timer_unordered_list: List::new(),
            #[cfg(feature = "softwaretimers")]
            task_timer_last_run: 0,
        }
    }

    fn reset(&mut self) {
        *self = Kernel::new();
    }

    #[inline]
    pub(crate) fn tick(&self) -> u32 {
        self.tick
    }

    #[inline]
    pub(crate) fn set_tick(&mut self, tick: u32) {
        self.tick = tick;
    }

    #[inline]
    pub(crate) fn scheduler_lock_nesting(&self) -> u32 {
        self.scheduler_lock
    }

    /// Bump the lock nesting counter without the `is_running`/overflow
    /// checks `scheduler_lock()` does. Used by `event::pend_task`, which
    /// runs on behalf of the already-running current task.
    #[inline]
    pub(crate) fn enter_lock(&mut self) {
        self.scheduler_lock = self.scheduler_lock.wrapping_add(1);
    }

    #[inline]
    pub(crate) fn not_overflowed(&mut self) -> &mut List<Task> {
        if self.overflowed_is_b {
            &mut self.list_a
        } else {
            &mut self.list_b
        }
    }

    #[inline]
    pub(crate) fn overflowed(&mut self) -> &mut List<Task> {
        if self.overflowed_is_b {
            &mut self.list_b
        } else {
            &mut self.list_a
        }
    }

    #[inline]
    pub(crate) fn swap_overflow_lists(&mut self) {
        self.overflowed_is_b = !self.overflowed_is_b;
    }

    #[inline]
    pub(crate) fn current(&self) -> Option<&'static Task> {
        self.current.map(|p| unsafe { &*p.as_ptr() })
    }

    #[inline]
    pub(crate) fn pending_ready(&mut self) -> &mut List<Task> {
        &mut self.pending_ready
    }

    /// Append `task` to `pending_ready` and raise the preemption hint if it
    /// now outranks whichever task is running.
    pub(crate) fn mark_pending_ready(&mut self, task: &'static Task) {
        task.set_state(TaskState::PendingReady);
        let tail = self.pending_ready.tail();
        unsafe { self.pending_ready.insert_after(tail, task.event_node()) };

        let outranks_current = match self.current {
            Some(cur) => task.priority() > unsafe { cur.as_ref() }.priority(),
            None => true,
        };
        if outranks_current {
            self.higher_priority_ready = true;
        }
    }

    /// Drain `pending_ready` into the ready table. Step (ii) of
    /// `SchedulerUnlock`/`Tick`.
    fn drain_pending_ready(&mut self) {
        while let Some(node) = unsafe { self.pending_ready.pop_front() } {
            let task_ptr = unsafe { node.as_ref() }.owner();
            let task = unsafe { task_ptr.as_ref() };
            task.set_state(TaskState::Ready);
            self.ready[task.priority() as usize] = Some(task_ptr);
        }
    }
}

/// Global scheduler-state instance.
static KERNEL: CsCell<Kernel> = CsCell::new(Kernel::new());

/// Brackets `KERNEL`'s `Init..Start` lifetime; see `crate::state_guard`.
static GUARD: StateGuard = StateGuard::new();

/// # Safety
/// Only valid while no task or ISR can concurrently observe the kernel
/// state: before `Init`, or in a single-threaded test harness.
pub(crate) unsafe fn kernel_unchecked() -> &'static mut Kernel {
    unsafe { KERNEL.get_unchecked() }
}

#[inline]
pub(crate) fn is_running() -> bool {
    FLAGS.is_running()
}

/// `Init`: zero all counters, self-link all list heads (already the case for
/// a freshly constructed `List`), set `scheduler_lock = 1`, null every ready
/// slot.
pub fn init() -> KernelResult<()> {
    critical_section(|cs| {
        let kernel = KERNEL.get(cs);
        kernel.reset();
        kernel.scheduler_lock = 1;
    });
    FLAGS.initialized.store(true, Ordering::SeqCst);
    FLAGS.running.store(false, Ordering::SeqCst);
    GUARD.mark_alive();
    Ok(())
}

/// `Start`: drop `scheduler_lock` to zero and perform the first selection.
/// Interrupt enable/disable is handled implicitly: the crate never leaves
/// a critical section held across a public call, so once this returns
/// interrupts are enabled by construction.
pub fn start() -> KernelResult<()> {
    if !FLAGS.is_initialized() {
        return Err(KernelError::NotRunning);
    }
    critical_section(|cs| {
        let kernel = KERNEL.get(cs);
        kernel.scheduler_lock = 0;
        FLAGS.running.store(true, Ordering::SeqCst);
        schedule(kernel, cs);
    });
    Ok(())
}

/// **Selection**: scan `ready[]` highest-to-lowest, pick the first occupied
/// slot, and, subject to the preemption policy, context switch into it.
pub(crate) fn schedule(kernel: &mut Kernel, _cs: &CriticalSection) {
    let candidate = kernel.ready.iter().rev().copied().find_map(|slot| slot);
    kernel.higher_priority_ready = false;

    let Some(candidate_ptr) = candidate else {
        return;
    };

    let switch = match kernel.current {
        None => true,
        Some(cur_ptr) if cur_ptr == candidate_ptr => false,
        Some(cur_ptr) => {
            let cur_task = unsafe { cur_ptr.as_ref() };
            if cur_task.state() != TaskState::Ready {
                // `current` just blocked or delayed itself and is no longer
                // in `ready[]` under its own slot. It must be switched away
                // from regardless of the candidate's priority.
                true
            } else {
                let cand_prio = unsafe { candidate_ptr.as_ref() }.priority();
                CFG_PREEMPTION_EN && cand_prio > cur_task.priority() && cand_prio > CFG_PREEMPT_LIMIT
            }
        }
    };

    if switch {
        let from = kernel.current.map(|p| unsafe { &*p.as_ptr() });
        let to = unsafe { &*candidate_ptr.as_ptr() };
        kernel.current = Some(candidate_ptr);
        stats::on_context_switch();
        port::current().context_switch(from, to);
    }
}

/// Drain `pending_ready` and, if warranted, reschedule. Shared by
/// `Tick` (when unlocked) and `SchedulerUnlock`.
pub(crate) fn drain_and_maybe_schedule(kernel: &mut Kernel, cs: &CriticalSection) {
    kernel.drain_pending_ready();
    if CFG_PREEMPTION_EN && kernel.higher_priority_ready {
        schedule(kernel, cs);
    } else {
        kernel.higher_priority_ready = false;
    }
}

/// If nothing holds the scheduler lock, drain and reschedule immediately;
/// otherwise the eventual `SchedulerUnlock` will do it.
pub(crate) fn drain_if_unlocked(kernel: &mut Kernel, cs: &CriticalSection) {
    if kernel.scheduler_lock == 0 {
        drain_and_maybe_schedule(kernel, cs);
    }
}

/// `SchedulerLock`: increment the nesting counter.
pub fn scheduler_lock() -> KernelResult<()> {
    if !FLAGS.is_running() {
        return Err(KernelError::NotRunning);
    }
    critical_section(|cs| {
        let kernel = KERNEL.get(cs);
        kernel.scheduler_lock = kernel
            .scheduler_lock
            .checked_add(1)
            .ok_or(KernelError::LockNestingError)?;
        Ok(())
    })
}

/// `SchedulerUnlock`: decrement the nesting counter and, at zero, (i) apply
/// accumulated `delayed_ticks`, (ii) drain `pending_ready`, (iii) reschedule
/// if the preemption policy calls for it.
pub fn scheduler_unlock() -> KernelResult<()> {
    if !FLAGS.is_running() {
        return Err(KernelError::NotRunning);
    }
    critical_section(|cs| {
        let kernel = KERNEL.get(cs);
        kernel.scheduler_lock = kernel
            .scheduler_lock
            .checked_sub(1)
            .ok_or(KernelError::LockNestingError)?;
        unlock_tail(kernel, cs);
        Ok(())
    })
}

/// Shared tail of `SchedulerUnlock`: once the nesting counter reaches zero,
/// replay accumulated `delayed_ticks` and drain/reschedule. Also used by
/// `event::pend_task`, which manages its own lock nesting around a block.
pub(crate) fn unlock_tail(kernel: &mut Kernel, cs: &CriticalSection) {
    if kernel.scheduler_lock == 0 {
        while kernel.delayed_ticks > 0 {
            kernel.delayed_ticks -= 1;
            crate::tick::advance_one(kernel, cs);
        }
        drain_and_maybe_schedule(kernel, cs);
    }
}

/// Decrement the lock nesting counter and run the shared unlock tail.
/// Counterpart to `Kernel::enter_lock` for `event::pend_task`.
pub(crate) fn exit_lock(kernel: &mut Kernel, cs: &CriticalSection) {
    kernel.scheduler_lock = kernel.scheduler_lock.saturating_sub(1);
    unlock_tail(kernel, cs);
}

#[inline]
pub(crate) fn record_delayed_tick(kernel: &mut Kernel) {
    kernel.delayed_ticks = kernel.delayed_ticks.wrapping_add(1);
}

/// Returns the task the scheduler is currently running, or `None` before
/// `Start` or when called from a context with no task of its own.
pub fn current_task() -> Option<&'static Task> {
    if !FLAGS.is_running() {
        return None;
    }
    critical_section(|cs| KERNEL.get(cs).current())
}

/// The current tick count. Used by logging/statistics seams that want a
/// timestamp; `0` before `Init`.
pub fn tick_get() -> u32 {
    critical_section(|cs| KERNEL.get(cs).tick())
}

/// `Create`: register a task at its fixed priority slot.
pub fn create_task(task: &'static Task) -> KernelResult<()> {
    let priority = task.priority();
    if priority as usize >= CFG_PRIO_MAX {
        return Err(KernelError::InvalidPriority);
    }

    critical_section(|cs| {
        let kernel = KERNEL.get(cs);
        if kernel.ready[priority as usize].is_some() {
            return Err(KernelError::DuplicatePriority);
        }
        task.attach_nodes();
        task.set_state(TaskState::Ready);
        kernel.ready[priority as usize] = Some(NonNull::from(task));
        Ok(())
    })?;

    stats::on_task_created();
    Ok(())
}

/// Remove `task` from its ready slot. Used by `TaskDelay` and by primitives
/// when a task blocks.
pub(crate) fn ready_remove(kernel: &mut Kernel, task: &Task) {
    kernel.ready[task.priority() as usize] = None;
}

pub(crate) fn kernel_get<'cs>(cs: &'cs CriticalSection) -> &'cs mut Kernel {
    GUARD.debug_check_alive();
    KERNEL.get(cs)
}

#[cfg(test)]
pub(crate) fn reset_for_test() {
    critical_section(|cs| KERNEL.get(cs).reset());
    FLAGS.initialized.store(false, Ordering::SeqCst);
    FLAGS.running.store(false, Ordering::SeqCst);
    GUARD.mark_torn_down();
}
