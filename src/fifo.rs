//! Byte FIFO with a per-waiter byte threshold (component F).
//!
//! Structured the same way as [`crate::queue`], generalized to byte counts
//! and keyed on each waiter's requested byte count: a `Write` of N bytes
//! only wakes a read-waiter if that waiter's requested count is `<= used`
//! (symmetrically for writers against `free`). That per-waiter threshold is
//! stashed in [`crate::task::Task::wait_key`], the same scratch field the
//! event node carries a priority key next to, read back by
//! [`crate::event::unblock_head_if`].

use core::mem::MaybeUninit;

use crate::critical::{critical_section, is_isr_context, CsCell};
use crate::error::{KernelError, KernelResult};
use crate::event::{self, Event};
use crate::sched;
use crate::task::Task;
use crate::test_hook;
use crate::types::{PendOutcome, Tick, PEND_NON_BLOCKING};

struct State<const N: usize> {
    event: Event,
    buf: [MaybeUninit<u8>; N],
    head: usize,
    tail: usize,
    used: usize,
    w_lock: u32,
    r_lock: u32,
}

/// A fixed-capacity byte FIFO. Unlike [`crate::queue::Queue`], reads and
/// writes each request an explicit byte count and are all-or-nothing: a
/// `read` for 10 bytes does not return a partial 3-byte read, it blocks (or
/// fails) until 10 bytes are available.
pub struct Fifo<const N: usize> {
    state: CsCell<State<N>>,
}

unsafe impl<const N: usize> Sync for Fifo<N> {}

impl<const N: usize> Fifo<N> {
    pub const fn new() -> Self {
        Fifo {
            state: CsCell::new(State {
                event: Event::new_read_write(),
                buf: [const { MaybeUninit::uninit() }; N],
                head: 0,
                tail: 0,
                used: 0,
                w_lock: 0,
                r_lock: 0,
            }),
        }
    }

    pub fn len(&self) -> usize {
        critical_section(|cs| self.state.get(cs).used)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Write`: enqueue all of `data`, blocking up to `ticks` until there is
    /// room for the whole slice. Fails immediately if `data` could never
    /// fit even in a fully-drained FIFO.
    pub fn write(&self, data: &[u8], ticks: Tick) -> KernelResult<()> {
        if data.len() > N {
            return Err(KernelError::CapacityExceeded);
        }
        if data.is_empty() {
            return Ok(());
        }
        if !sched::is_running() {
            return Err(KernelError::NotRunning);
        }
        if ticks != PEND_NON_BLOCKING && is_isr_context() {
            return Err(KernelError::CalledFromIsr);
        }

        loop {
            let pend_needed = critical_section(|cs| -> KernelResult<Option<&'static Task>> {
                let kernel = sched::kernel_get(cs);
                let state = self.state.get(cs);
                let free = N - state.used;

                if free >= data.len() {
                    state.w_lock += 1;
                    test_hook::fire();
                    for &byte in data {
                        state.buf[state.tail] = MaybeUninit::new(byte);
                        state.tail = (state.tail + 1) % N;
                    }
                    state.used += data.len();
                    state.w_lock -= 1;

                    let used_now = state.used as u32;
                    event::unblock_head_if(kernel, state.event.read_list(), |want| want <= used_now);
                    sched::drain_if_unlocked(kernel, cs);
                    return Ok(None);
                }

                if ticks == PEND_NON_BLOCKING {
                    return Err(KernelError::CapacityExceeded);
                }

                let current = kernel.current().ok_or(KernelError::CalledFromIsr)?;
                current.set_wait_key(data.len() as u32);
                event::pre_pend_task(state.event.write_list(), current);
                Ok(Some(current))
            })?;

            let Some(current) = pend_needed else {
                return Ok(());
            };

            critical_section(|cs| {
                let kernel = sched::kernel_get(cs);
                event::pend_task(kernel, current, ticks, cs);
            });
            match current.pend_outcome() {
                PendOutcome::Ok => continue,
                PendOutcome::TimedOut => return Err(KernelError::TimedOut),
            }
        }
    }

    /// `Read`: fill all of `buf`, blocking up to `ticks` until that many
    /// bytes are available.
    pub fn read(&self, buf: &mut [u8], ticks: Tick) -> KernelResult<()> {
        if buf.len() > N {
            return Err(KernelError::CapacityExceeded);
        }
        if buf.is_empty() {
            return Ok(());
        }
        if !sched::is_running() {
            return Err(KernelError::NotRunning);
        }
        if ticks != PEND_NON_BLOCKING && is_isr_context() {
            return Err(KernelError::CalledFromIsr);
        }

        loop {
            let pend_needed = critical_section(|cs| -> KernelResult<Option<&'static Task>> {
                let kernel = sched::kernel_get(cs);
                let state = self.state.get(cs);

                if state.used >= buf.len() {
                    state.r_lock += 1;
                    test_hook::fire();
                    for slot in buf.iter_mut() {
                        *slot = unsafe { state.buf[state.head].assume_init_read() };
                        state.head = (state.head + 1) % N;
                    }
                    state.used -= buf.len();
                    state.r_lock -= 1;

                    let free_now = (N - state.used) as u32;
                    event::unblock_head_if(kernel, state.event.write_list(), |want| want <= free_now);
                    sched::drain_if_unlocked(kernel, cs);
                    return Ok(None);
                }

                if ticks == PEND_NON_BLOCKING {
                    return Err(KernelError::WouldBlock);
                }

                let current = kernel.current().ok_or(KernelError::CalledFromIsr)?;
                current.set_wait_key(buf.len() as u32);
                event::pre_pend_task(state.event.read_list(), current);
                Ok(Some(current))
            })?;

            let Some(current) = pend_needed else {
                return Ok(());
            };

            critical_section(|cs| {
                let kernel = sched::kernel_get(cs);
                event::pend_task(kernel, current, ticks, cs);
            });
            match current.pend_outcome() {
                PendOutcome::Ok => continue,
                PendOutcome::TimedOut => return Err(KernelError::TimedOut),
            }
        }
    }
}

impl<const N: usize> Default for Fifo<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::{create_task, init, reset_for_test, start};

    #[test]
    fn write_then_read_round_trips_bytes() {
        reset_for_test();
        init().unwrap();
        static IDLE: Task = Task::new("idle", 0);
        create_task(&IDLE).unwrap();
        start().unwrap();

        static F: Fifo<8> = Fifo::new();
        F.write(b"abcd", PEND_NON_BLOCKING).unwrap();
        assert_eq!(F.len(), 4);

        let mut out = [0u8; 4];
        F.read(&mut out, PEND_NON_BLOCKING).unwrap();
        assert_eq!(&out, b"abcd");
        assert!(F.is_empty());
    }

    #[test]
    fn write_rejects_a_slice_that_can_never_fit() {
        reset_for_test();
        init().unwrap();
        static IDLE: Task = Task::new("idle", 0);
        create_task(&IDLE).unwrap();
        start().unwrap();

        static F: Fifo<4> = Fifo::new();
        assert_eq!(
            F.write(&[0u8; 5], PEND_NON_BLOCKING),
            Err(KernelError::CapacityExceeded)
        );
    }

    #[test]
    fn read_blocks_until_enough_bytes_even_if_fifo_is_non_empty() {
        reset_for_test();
        init().unwrap();
        static IDLE: Task = Task::new("idle", 0);
        static A: Task = Task::new("a", 1);
        create_task(&IDLE).unwrap();
        create_task(&A).unwrap();
        start().unwrap();

        static F: Fifo<8> = Fifo::new();
        F.write(b"ab", PEND_NON_BLOCKING).unwrap();

        // A wants 4 bytes but only 2 are available: pre-pend it with that
        // threshold, then prove a 3-byte write still isn't enough to wake
        // it, while a subsequent byte that tips it to 4 does.
        let pending = critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            let state = F.state.get(cs);
            let current = kernel.current().unwrap();
            current.set_wait_key(4);
            event::pre_pend_task(state.event.read_list(), current);
            current
        });
        critical_section(|cs| {
            let kernel = sched::kernel_get(cs);
            event::pend_task(kernel, pending, crate::types::PEND_FOREVER, cs);
        });
        assert_eq!(A.state(), crate::types::TaskState::Pending);

        F.write(b"c", PEND_NON_BLOCKING).unwrap();
        assert_eq!(A.state(), crate::types::TaskState::Pending, "3 bytes still not enough");

        F.write(b"d", PEND_NON_BLOCKING).unwrap();
        assert_eq!(A.state(), crate::types::TaskState::Ready, "4th byte meets the threshold");
    }
}
