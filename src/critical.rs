//! Interrupt-level critical section.
//!
//! Built on the `critical-section` crate rather than hand-rolled interrupt
//! masking: a board crate registers the real `Impl` (PRIMASK disable/restore
//! on Cortex-M), and the `std` feature pulled in under `dev-dependencies`
//! registers a mutex-backed one for `cargo test`. Everything in this module
//! is a thin, nestable wrapper around `critical_section::{acquire, release}`.

use core::cell::UnsafeCell;

/// RAII guard for the interrupt-level critical section described in the
/// concurrency model: nestable, saves and restores interrupt-enable state.
pub struct CriticalSection {
    token: critical_section::RestoreState,
}

impl CriticalSection {
    /// Enter the critical section, disabling interrupts if not already
    /// inside one (nesting is handled by the registered `Impl`).
    #[inline(always)]
    pub fn enter() -> Self {
        let token = unsafe { critical_section::acquire() };
        CriticalSection { token }
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        unsafe { critical_section::release(self.token) };
    }
}

/// Run `f` with the interrupt-level critical section held.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// Whether the caller is currently executing inside an ISR.
///
/// The port layer is the only thing that actually knows this; this core
/// has no portable way to ask "am I in an interrupt" on its own, so it
/// delegates to the registered [`crate::port::Port`] implementation.
#[inline]
pub fn is_isr_context() -> bool {
    crate::port::current().is_isr_context()
}

/// A cell that may only be accessed while holding a [`CriticalSection`]
/// token, used for structures mutated only under the interrupt-level
/// critical section (event lists, ready table, `pending_ready`, tick
/// counters).
pub struct CsCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for CsCell<T> {}

impl<T> CsCell<T> {
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Borrow the inner value mutably. Proof of holding the CS is the `&CriticalSection`.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub fn get(&self, _cs: &CriticalSection) -> &mut T {
        unsafe { &mut *self.0.get() }
    }

    /// Borrow without a token. Only valid where the caller can otherwise
    /// prove exclusive access (e.g. single-threaded test setup before
    /// `Start`).
    ///
    /// # Safety
    /// The caller must guarantee no concurrent access, from a task or an
    /// ISR, for the lifetime of the returned reference.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_unchecked(&self) -> &mut T {
        unsafe { &mut *self.0.get() }
    }
}
