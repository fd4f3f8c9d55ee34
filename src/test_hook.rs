//! A concurrent-access test seam: a no-op in production, called
//! from `Queue`/`Fifo` between the moment they decide a write/read can
//! proceed and the moment they commit it (advance the ring pointer, update
//! `used`/`free`). In production this is a pure no-op: the interrupt-level
//! critical section already rules out real interruption there. Under test
//! it lets a test install a callback that mutates the structure from
//! "inside" that window, to check that the reservation counters
//! (`w_lock`/`r_lock`) keep pointers and counts consistent regardless.
//!
//! Single-threaded by construction: the kernel's tests run with
//! `--test-threads=1` (see DESIGN.md), so a plain `Cell` is sufficient.

#[cfg(not(test))]
#[inline(always)]
pub(crate) fn fire() {}

#[cfg(test)]
use core::cell::Cell;

#[cfg(test)]
struct HookCell(Cell<Option<fn()>>);

#[cfg(test)]
unsafe impl Sync for HookCell {}

#[cfg(test)]
static HOOK: HookCell = HookCell(Cell::new(None));

#[cfg(test)]
pub(crate) fn fire() {
    if let Some(f) = HOOK.0.get() {
        f();
    }
}

/// Install `f` to run the next (and every subsequent) time the hook fires,
/// until [`clear`] is called. Test-only.
#[cfg(test)]
pub(crate) fn set(f: fn()) {
    HOOK.0.set(Some(f));
}

/// Remove whatever hook is installed.
#[cfg(test)]
pub(crate) fn clear() {
    HOOK.0.set(None);
}
