//! Integration tests exercising the kernel's public API end to end.
//!
//! The scheduler state is a process-wide singleton, so every test calls
//! `librertos::init()` itself to reset it and must not run concurrently
//! with another test touching the singleton. Run this binary with
//! `--test-threads=1` (the crate-wide convention, see DESIGN.md).

use librertos::{
    config::CFG_PRIO_MAX,
    current_task, init, start,
    task::{task_resume, Task},
    tick::{task_delay, tick},
    types::{TaskState, PEND_NON_BLOCKING},
    Fifo, KernelError, Mutex, Queue, Semaphore,
};

fn boot_with<const N: usize>(tasks: [&'static Task; N]) {
    init().unwrap();
    for t in tasks {
        librertos::create_task(t).unwrap();
    }
    start().unwrap();
}

#[test]
fn scheduler_selects_highest_priority_ready_task() {
    static IDLE: Task = Task::new("idle", 0);
    static LOW: Task = Task::new("low", 1);
    static MID: Task = Task::new("mid", 2);
    static HIGH: Task = Task::new("high", 3);
    boot_with([&IDLE, &LOW, &MID, &HIGH]);

    assert_eq!(current_task().map(|t| t.name()), Some("high"));
}

#[test]
fn duplicate_and_invalid_priorities_are_rejected() {
    static IDLE2: Task = Task::new("idle2", 0);
    static A: Task = Task::new("a2", 5);
    static B: Task = Task::new("b2", 5);
    static TOO_HIGH: Task = Task::new("too-high", CFG_PRIO_MAX as u8);

    init().unwrap();
    librertos::create_task(&IDLE2).unwrap();
    librertos::create_task(&A).unwrap();
    assert_eq!(librertos::create_task(&B), Err(KernelError::DuplicatePriority));
    assert_eq!(librertos::create_task(&TOO_HIGH), Err(KernelError::InvalidPriority));
}

/// Delaying the running task parks it, and enough ticks bring it back to
/// `Ready`.
#[test]
fn task_delay_blocks_until_the_tick_engine_wakes_it() {
    static IDLE3: Task = Task::new("idle3", 0);
    static T: Task = Task::new("t3", 1);
    boot_with([&IDLE3, &T]);

    assert_eq!(current_task().map(|t| t.name()), Some("t3"));
    task_delay(3).unwrap();
    assert_eq!(T.state(), TaskState::Delayed);
    assert_eq!(current_task().map(|t| t.name()), Some("idle3"));

    tick();
    tick();
    assert_eq!(T.state(), TaskState::Delayed);

    tick();
    assert_eq!(T.state(), TaskState::Ready);
}

#[test]
fn task_resume_force_wakes_a_delayed_task() {
    static IDLE4: Task = Task::new("idle4", 0);
    static T: Task = Task::new("t4", 1);
    boot_with([&IDLE4, &T]);

    task_delay(1_000).unwrap();
    assert_eq!(T.state(), TaskState::Delayed);

    task_resume(&T).unwrap();
    assert_eq!(T.state(), TaskState::Ready);
}

#[test]
fn semaphore_non_blocking_take_and_give_stay_within_bounds() {
    static IDLE5: Task = Task::new("idle5", 0);
    boot_with([&IDLE5]);

    static SEM: Semaphore = Semaphore::new(0, 1);
    assert_eq!(SEM.take(PEND_NON_BLOCKING), Err(KernelError::WouldBlock));

    SEM.give().unwrap();
    assert_eq!(SEM.count(), 1);

    SEM.take(PEND_NON_BLOCKING).unwrap();
    assert_eq!(SEM.count(), 0);
}

#[test]
fn mutex_recursion_tracks_nesting_and_clears_owner() {
    static IDLE6: Task = Task::new("idle6", 0);
    static A: Task = Task::new("a6", 1);
    boot_with([&IDLE6, &A]);

    static MTX: Mutex = Mutex::new();
    MTX.lock(PEND_NON_BLOCKING).unwrap();
    assert_eq!(MTX.count(), 1);
    MTX.lock(PEND_NON_BLOCKING).unwrap();
    assert_eq!(MTX.count(), 2);
    MTX.unlock().unwrap();
    assert_eq!(MTX.count(), 1);
    MTX.unlock().unwrap();
    assert_eq!(MTX.count(), 0);
    assert!(!MTX.is_owned_by(&A));
}

#[test]
fn queue_wraps_and_keeps_used_plus_free_consistent() {
    static IDLE7: Task = Task::new("idle7", 0);
    boot_with([&IDLE7]);

    static Q: Queue<u32, 8> = Queue::new();
    for i in 0..4u32 {
        Q.send(i, PEND_NON_BLOCKING).unwrap();
    }
    for i in 0..4u32 {
        assert_eq!(Q.receive(PEND_NON_BLOCKING).unwrap(), i);
    }
    for i in 0..8u32 {
        Q.send(100 + i, PEND_NON_BLOCKING).unwrap();
    }
    assert!(Q.is_full());
    assert_eq!(Q.send(1, PEND_NON_BLOCKING), Err(KernelError::CapacityExceeded));

    for i in 0..8u32 {
        assert_eq!(Q.receive(PEND_NON_BLOCKING).unwrap(), 100 + i);
    }
    assert!(Q.is_empty());
}

#[test]
fn fifo_rejects_writes_that_can_never_fit_and_round_trips_bytes() {
    static IDLE8: Task = Task::new("idle8", 0);
    boot_with([&IDLE8]);

    static F: Fifo<8> = Fifo::new();
    assert_eq!(
        F.write(&[0u8; 9], PEND_NON_BLOCKING),
        Err(KernelError::CapacityExceeded)
    );

    F.write(b"hello", PEND_NON_BLOCKING).unwrap();
    assert_eq!(F.len(), 5);

    let mut out = [0u8; 5];
    F.read(&mut out, PEND_NON_BLOCKING).unwrap();
    assert_eq!(&out, b"hello");
    assert!(F.is_empty());
}

#[test]
fn scheduler_lock_defers_tick_processing_until_unlock() {
    static IDLE9: Task = Task::new("idle9", 0);
    static T9: Task = Task::new("t9", 1);
    boot_with([&IDLE9, &T9]);

    let before = librertos::tick_get();
    librertos::scheduler_lock().unwrap();
    tick();
    tick();
    assert_eq!(librertos::tick_get(), before, "tick must not advance while locked");

    librertos::scheduler_unlock().unwrap();
    assert_eq!(librertos::tick_get(), before + 2, "locked ticks replay on unlock");
}

#[cfg(feature = "softwaretimers")]
mod timer_tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use librertos::{timer_start, timer_task_step, Timer};

    static FIRES: AtomicU32 = AtomicU32::new(0);

    fn record(_t: &'static Timer) {
        FIRES.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn one_shot_timer_fires_exactly_once() {
        static IDLE10: Task = Task::new("idle10", 0);
        boot_with([&IDLE10]);
        FIRES.store(0, Ordering::Relaxed);

        static T: Timer = Timer::new("once", 0, record);
        timer_start(&T, 0);
        timer_task_step();
        assert_eq!(FIRES.load(Ordering::Relaxed), 1);
        assert!(!T.is_active());
    }
}
