//! A small preemptive real-time kernel: fixed-priority scheduler, tick
//! engine, and blocking synchronization primitives for deeply embedded
//! targets.
//!
//! The core covered here is the scheduler + event/blocking subsystem: the
//! priority-ordered task table ([`task`]), the tick engine with dual
//! overflow-aware delay lists ([`tick`]), the event-list pend/unblock
//! protocol used by every synchronization primitive ([`event`]), and the
//! two-layer critical-section discipline ([`critical`] + the scheduler
//! lock in [`sched`]) that keeps all of it race-free against both
//! interrupts and concurrent ready tasks. [`semaphore`], [`mutex`],
//! [`queue`], and [`fifo`] are the clients built on top of that core;
//! [`timer`] is an optional dedicated consumer of the same tick engine.
//!
//! Out of scope here (thin collaborators specified only at their
//! boundary): [`stats`], [`state_guard`], and the platform [`port`] layer.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

pub mod log;
mod lang_items;

pub mod config;
pub mod critical;
pub mod error;
pub mod event;
pub mod fifo;
pub mod list;
pub mod mutex;
pub mod port;
pub mod queue;
pub mod sched;
pub mod semaphore;
pub mod state_guard;
pub mod stats;
pub mod task;
pub mod tick;

#[cfg(feature = "softwaretimers")]
pub mod timer;

pub mod types;

#[cfg(test)]
mod test_hook;

pub use error::{KernelError, KernelResult};
pub use fifo::Fifo;
pub use mutex::Mutex;
pub use queue::Queue;
pub use sched::{create_task, current_task, init, scheduler_lock, scheduler_unlock, start, tick_get};
pub use semaphore::Semaphore;
pub use task::{task_resume, Task};
pub use tick::{task_delay, tick};
pub use types::*;

#[cfg(feature = "softwaretimers")]
pub use timer::{timer_start, timer_stop, timer_task_step, Timer, TimerCallback};

#[cfg(feature = "pac")]
pub use stm32_metapac as pac;
