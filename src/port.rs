//! Port layer.
//!
//! Per the external interface list, the kernel *consumes* a port layer; it
//! does not provide one. Interrupt enable/disable and critical-section
//! enter/exit are delegated entirely to the `critical-section` crate
//! (`crate::critical`). What remains is the one hook this core still needs:
//! the low-level context switch, plus the ISR-context query and a monotonic
//! microsecond source used only by statistics.

use crate::task::Task;

/// The single hook the scheduler calls into when `current` changes, and the
/// two queries the rest of the core needs from the platform.
pub trait Port: Sync {
    /// Invoked by the scheduler after it has updated `current` but before
    /// returning to the (new) running task. `from` is `None` only during
    /// `Start`, when there was no previously running task.
    fn context_switch(&self, from: Option<&'static Task>, to: &'static Task);

    /// Whether the caller is currently executing inside an interrupt
    /// handler. Used by primitives to reject calls that only make sense
    /// from task context (e.g. `TaskDelay`).
    fn is_isr_context(&self) -> bool;

    /// Monotonic microsecond clock, consumed only by the statistics
    /// collaborator.
    fn system_run_time_us(&self) -> u32 {
        0
    }
}

#[cfg(target_arch = "arm")]
mod cortex_m4 {
    use super::Port;
    use crate::task::Task;

    pub struct CortexM4Port;

    impl Port for CortexM4Port {
        fn context_switch(&self, _from: Option<&'static Task>, _to: &'static Task) {
            cortex_m::peripheral::SCB::set_pendsv();
        }

        fn is_isr_context(&self) -> bool {
            let ipsr: u32;
            unsafe {
                core::arch::asm!(
                    "mrs {}, IPSR",
                    out(reg) ipsr,
                    options(nomem, nostack, preserves_flags)
                );
            }
            ipsr != 0
        }
    }

    pub static PORT: CortexM4Port = CortexM4Port;
}

/// Host/test stub: records nothing, switches nothing, never claims to be in
/// an ISR. Tests that need to model "an ISR unblocked a task" just call the
/// unblocking function directly. There is no real second thread of
/// execution to fake.
#[cfg(not(target_arch = "arm"))]
mod stub {
    use super::Port;
    use crate::task::Task;

    pub struct StubPort;

    impl Port for StubPort {
        fn context_switch(&self, _from: Option<&'static Task>, _to: &'static Task) {}

        fn is_isr_context(&self) -> bool {
            false
        }
    }

    pub static PORT: StubPort = StubPort;
}

#[cfg(target_arch = "arm")]
pub fn current() -> &'static dyn Port {
    &cortex_m4::PORT
}

#[cfg(not(target_arch = "arm"))]
pub fn current() -> &'static dyn Port {
    &stub::PORT
}
