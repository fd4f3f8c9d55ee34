//! Priority Inversion Demo - this kernel's mutex has no priority
//! inheritance, by explicit design. This demo sets up the classic
//! three-task scenario, High(20), Med(10), Low(5), to make that tradeoff
//! visible rather than to resolve it: if `LOW` is holding `MTX` when `HIGH`
//! blocks on it, `MED` is free to preempt `LOW` and delay the handoff
//! indefinitely. An integrator who needs bounded blocking must either avoid
//! shared mutexes across priority bands or layer inheritance on top; this
//! crate does not do it for you.

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m_rt::{entry, exception};
use librertos::mutex::Mutex;
use librertos::task::Task;
use librertos::tick::{task_delay, tick};
use librertos::types::PEND_FOREVER;
use librertos::{create_task, info, init, start};

static HIGH_RUNS: AtomicU32 = AtomicU32::new(0);
static LOW_RUNS: AtomicU32 = AtomicU32::new(0);

static MTX: Mutex = Mutex::new();

static IDLE: Task = Task::new("idle", 0);
static LOW: Task = Task::new("low", 5);
static MED: Task = Task::new("med", 10);
static HIGH: Task = Task::new("high", 20);

/// High priority: waits briefly, then repeatedly takes the mutex for a
/// short critical section.
fn high_task_body() -> ! {
    let _ = task_delay(50);

    loop {
        let n = HIGH_RUNS.fetch_add(1, Ordering::Relaxed) + 1;

        let _ = MTX.lock(PEND_FOREVER);
        info!("[HIGH] acquired #{}", n);
        for _ in 0..1_000 {
            cortex_m::asm::nop();
        }
        let _ = MTX.unlock();

        let _ = task_delay(100);
    }
}

/// Medium priority: purely CPU-bound, never touches the mutex. With no
/// priority inheritance, this task can run indefinitely while `HIGH` waits
/// on `LOW`.
fn med_task_body() -> ! {
    loop {
        for _ in 0..50_000 {
            cortex_m::asm::nop();
        }
        let _ = task_delay(10);
    }
}

/// Low priority: holds the mutex for a comparatively long critical section.
fn low_task_body() -> ! {
    loop {
        let n = LOW_RUNS.fetch_add(1, Ordering::Relaxed) + 1;

        let _ = MTX.lock(PEND_FOREVER);
        info!("[LOW] holding #{}", n);
        for _ in 0..100_000 {
            cortex_m::asm::nop();
        }
        let _ = MTX.unlock();

        let _ = task_delay(200);
    }
}

#[exception]
fn SysTick() {
    tick();
}

#[entry]
fn main() -> ! {
    info!("priority inversion demo: high(20) med(10) low(5), no inheritance");

    init().expect("kernel init failed");
    create_task(&IDLE).unwrap();
    create_task(&LOW).unwrap();
    create_task(&MED).unwrap();
    create_task(&HIGH).unwrap();

    info!("starting kernel");
    start().expect("kernel start failed");

    loop {
        cortex_m::asm::wfi();
    }
}
