//! Task table (component C): the `Task` type and the ready-slot array it
//! lives in once registered.
//!
//! A task's storage is always owned by the host (a `static`), never by the
//! kernel. The kernel only ever sees `&'static Task`. Its two embedded
//! list nodes (`delay_node`, `event_node`) get their back-pointer to the
//! task wired up once, at registration time, once the task's address is
//! fixed, rather than attempting to construct a fully self-referential
//! value up front.

use core::cell::{Cell, UnsafeCell};
use core::ptr::NonNull;

use crate::critical::critical_section;
use crate::error::{KernelError, KernelResult};
use crate::list::{remove_wherever, Node};
use crate::sched;
use crate::tick;
use crate::types::{PendOutcome, Priority, TaskState};

/// A schedulable unit. Exactly one `Task` occupies any given priority slot.
pub struct Task {
    priority: Priority,
    state: Cell<TaskState>,
    pend_outcome: Cell<PendOutcome>,
    /// Byte/item threshold a FIFO or queue waiter is blocked on; read back
    /// by `Event::unblock` to decide whether this waiter can be woken. Also
    /// doubles as scratch storage for other primitives that don't need it.
    wait_key: Cell<u32>,
    delay_node: UnsafeCell<Node<Task>>,
    event_node: UnsafeCell<Node<Task>>,
    name: &'static str,
}

// A `Task` is always accessed either from the single task that owns the CPU
// or under the kernel's critical section / scheduler lock; the raw `Cell`s
// and `UnsafeCell`s above are sound under that discipline, same as `CsCell`.
unsafe impl Sync for Task {}

impl Task {
    /// Build a task at a given priority. Must still be registered with
    /// [`crate::sched::create_task`] before the kernel will consider it.
    pub const fn new(name: &'static str, priority: Priority) -> Self {
        Task {
            priority,
            state: Cell::new(TaskState::Ready),
            pend_outcome: Cell::new(PendOutcome::Ok),
            wait_key: Cell::new(0),
            delay_node: UnsafeCell::new(Node::new()),
            event_node: UnsafeCell::new(Node::new()),
            name,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state.get()
    }

    #[inline]
    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.set(state);
    }

    #[inline]
    pub fn pend_outcome(&self) -> PendOutcome {
        self.pend_outcome.get()
    }

    #[inline]
    pub(crate) fn set_pend_outcome(&self, outcome: PendOutcome) {
        self.pend_outcome.set(outcome);
    }

    #[inline]
    pub fn wait_key(&self) -> u32 {
        self.wait_key.get()
    }

    #[inline]
    pub(crate) fn set_wait_key(&self, key: u32) {
        self.wait_key.set(key);
    }

    /// Raw pointer to this task's delay-list node.
    #[inline]
    pub(crate) fn delay_node(&self) -> NonNull<Node<Task>> {
        unsafe { NonNull::new_unchecked(self.delay_node.get()) }
    }

    /// Raw pointer to this task's event-list node.
    #[inline]
    pub(crate) fn event_node(&self) -> NonNull<Node<Task>> {
        unsafe { NonNull::new_unchecked(self.event_node.get()) }
    }

    /// Wire up both nodes' back-pointer to `self`. Called exactly once, by
    /// [`crate::sched::create_task`], now that `self`'s address is fixed.
    pub(crate) fn attach_nodes(&'static self) {
        let self_ptr = NonNull::from(self);
        unsafe { (*self.delay_node.get()).set_owner(self_ptr) };
        unsafe { (*self.event_node.get()).set_owner(self_ptr) };
    }
}

/// `TaskResume`: force-unblock `task` regardless of what it is blocked on
/// (a delay, a primitive's event list, or both), moving it straight to
/// `pending_ready`. A no-op if `task` is not currently blocked: resuming a
/// task that is already ready (or already pending-ready) does not requeue
/// it a second time.
pub fn task_resume(task: &'static Task) -> KernelResult<()> {
    if !sched::is_running() {
        return Err(KernelError::NotRunning);
    }

    critical_section(|cs| {
        let kernel = sched::kernel_get(cs);
        if !task.state().is_blocked() {
            return;
        }

        tick::cancel_delay(task);
        unsafe { remove_wherever(task.event_node()) };
        task.set_pend_outcome(PendOutcome::Ok);
        kernel.mark_pending_ready(task);
        sched::drain_if_unlocked(kernel, cs);
    });

    Ok(())
}
