//! Blink Example - LED blinking coordinated through the kernel's tick engine.
//!
//! This core tracks *scheduling state* only. Per-task stacks and the
//! PendSV dispatch that actually switches between them are the
//! integrator's responsibility. What's shown here is the part this crate
//! does own: registering tasks at their priorities, driving the tick
//! engine from `SysTick`, and blocking a task on `task_delay` until the
//! engine wakes it back up.

#![no_std]
#![no_main]

use cortex_m_rt::{entry, exception};
use librertos::task::Task;
use librertos::tick::{task_delay, tick};
use librertos::{create_task, info, init, start};

#[cfg(feature = "pac")]
use stm32_metapac as pac;

static IDLE: Task = Task::new("idle", 0);
static BLINK: Task = Task::new("blink", 5);
static PRINTER: Task = Task::new("printer", 5 + 1);

#[cfg(feature = "pac")]
fn led_init() {
    pac::RCC.ahb1enr().modify(|w| w.set_gpioaen(true));
    pac::GPIOA.moder().modify(|w| w.set_moder(5, pac::gpio::vals::Moder::OUTPUT));
    pac::GPIOA.otyper().modify(|w| w.set_ot(5, pac::gpio::vals::Ot::PUSHPULL));
}

#[cfg(feature = "pac")]
fn led_on() {
    pac::GPIOA.bsrr().write(|w| w.set_bs(5, true));
}

#[cfg(feature = "pac")]
fn led_off() {
    pac::GPIOA.bsrr().write(|w| w.set_br(5, true));
}

#[cfg(not(feature = "pac"))]
fn led_init() {}
#[cfg(not(feature = "pac"))]
fn led_on() {}
#[cfg(not(feature = "pac"))]
fn led_off() {}

/// The blink task's body. Invoked on `BLINK`'s own stack by whatever
/// dispatcher the board glue supplies once `BLINK` is selected as `current`.
fn blink_task_body() -> ! {
    info!("blink task started");
    loop {
        led_on();
        let _ = task_delay(500);

        led_off();
        let _ = task_delay(500);
    }
}

fn printer_task_body() -> ! {
    info!("printer task started");
    loop {
        info!("tick");
        let _ = task_delay(1000);
    }
}

/// `SysTick` drives the tick engine; one tick here is one `CFG_TICK_RATE_HZ`
/// period.
#[exception]
fn SysTick() {
    tick();
}

#[entry]
fn main() -> ! {
    led_init();

    init().expect("kernel init failed");
    create_task(&IDLE).expect("idle task registration failed");
    create_task(&BLINK).expect("blink task registration failed");
    create_task(&PRINTER).expect("printer task registration failed");

    info!("starting kernel");
    start().expect("kernel start failed");

    // From here on `current_task()` reports whichever of BLINK/PRINTER/IDLE
    // the scheduler selected; a board-specific PendSV handler is what
    // actually transfers control to `blink_task_body`/`printer_task_body`.
    loop {
        cortex_m::asm::wfi();
    }
}
