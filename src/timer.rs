//! Software timers (component G), optional behind `CFG_SOFTWARE_TIMERS_EN`.
//!
//! Drains newly-armed entries into an ordered structure, then fires
//! whatever's due, all consumed by a dedicated task, using this crate's
//! own [`crate::list::List`] rather than a tick wheel, consistent with
//! [`crate::tick`]'s dual-list choice.
//!
//! A timer is armed with [`timer_start`], which drops it on
//! `timer_unordered_list` with O(1) cost even from an ISR. The dedicated
//! timer task calls [`timer_task_step`] in a loop: each call merges
//! whatever landed on the unordered list into the time-ordered one, fires
//! every timer whose deadline has passed, reschedules periodics, and
//! reports how long to delay until the next deadline.

use core::cell::{Cell, UnsafeCell};
use core::ptr::NonNull;

use crate::critical::critical_section;
use crate::list::{remove_wherever, Node};
use crate::sched::{self, Kernel};
use crate::types::Tick;

/// Called with the timer that just fired. Runs inside the dedicated timer
/// task's context, under the interrupt-level critical section. Keep it
/// short, the same discipline every other kernel-invoked callback needs.
pub type TimerCallback = fn(&'static Timer);

/// A software timer. `period == 0` means one-shot; a nonzero period
/// reschedules itself after every fire.
pub struct Timer {
    node: UnsafeCell<Node<Timer>>,
    period: Cell<Tick>,
    callback: TimerCallback,
    name: &'static str,
    active: Cell<bool>,
    attached: Cell<bool>,
}

unsafe impl Sync for Timer {}

impl Timer {
    pub const fn new(name: &'static str, period: Tick, callback: TimerCallback) -> Self {
        Timer {
            node: UnsafeCell::new(Node::new()),
            period: Cell::new(period),
            callback,
            name,
            active: Cell::new(false),
            attached: Cell::new(false),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn period(&self) -> Tick {
        self.period.get()
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    fn node_ptr(&self) -> NonNull<Node<Timer>> {
        unsafe { NonNull::new_unchecked(self.node.get()) }
    }

    fn is_linked(&self) -> bool {
        unsafe { &*self.node.get() }.is_linked()
    }

    /// Wire up the node's back-pointer the first time this timer is armed,
    /// mirroring `Task::attach_nodes`.
    fn ensure_attached(&'static self) {
        if self.attached.get() {
            return;
        }
        let ptr = NonNull::from(self);
        unsafe { (*self.node.get()).set_owner(ptr) };
        self.attached.set(true);
    }
}

/// `TimerStart`: arm `timer` to first fire `delay` ticks from now. Cheap
/// enough to call from an ISR; it only ever touches the unordered list.
pub fn timer_start(timer: &'static Timer, delay: Tick) {
    timer.ensure_attached();
    critical_section(|cs| {
        let kernel = sched::kernel_get(cs);
        if timer.is_linked() {
            unsafe { remove_wherever(timer.node_ptr()) };
        }
        timer.active.set(true);
        let wake = kernel.tick().wrapping_add(delay);
        unsafe { kernel.timer_unordered_list.insert(timer.node_ptr(), wake) };
    });
}

/// `TimerStop`: disarm `timer`, removing it from whichever list currently
/// holds it.
pub fn timer_stop(timer: &'static Timer) {
    timer.active.set(false);
    unsafe { remove_wherever(timer.node_ptr()) };
}

/// One step of the dedicated timer task: merge `timer_unordered_list` into
/// `timer_list`, fire everything due, reschedule periodics, and return how
/// many ticks until the next deadline (`None` if nothing is armed). The
/// timer task's body is expected to be a loop of
/// `task_delay(timer_task_step().unwrap_or(MAX_SLEEP))`.
pub fn timer_task_step() -> Option<Tick> {
    critical_section(|cs| {
        let kernel = sched::kernel_get(cs);
        merge_unordered(kernel);

        let now = kernel.tick();
        loop {
            let Some(head) = kernel.timer_list.head() else {
                break;
            };
            if unsafe { head.as_ref() }.key() > now {
                break;
            }

            let timer_ptr = unsafe { head.as_ref() }.owner();
            let timer = unsafe { timer_ptr.as_ref() };
            unsafe { kernel.timer_list.remove(head) };

            (timer.callback)(timer);

            if timer.is_active() && timer.period() > 0 {
                let next = now.wrapping_add(timer.period());
                unsafe { kernel.timer_list.insert(timer.node_ptr(), next) };
            } else {
                timer.active.set(false);
            }
        }

        kernel.task_timer_last_run = now;
        kernel
            .timer_list
            .head()
            .map(|h| unsafe { h.as_ref() }.key().wrapping_sub(now))
    })
}

fn merge_unordered(kernel: &mut Kernel) {
    while let Some(node) = unsafe { kernel.timer_unordered_list.pop_front() } {
        let key = unsafe { node.as_ref() }.key();
        unsafe { kernel.timer_list.insert(node, key) };
    }
}
