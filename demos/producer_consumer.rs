//! Producer-Consumer example using the typed queue rather than a bare
//! semaphore. Each item carries its own sequence number instead of the
//! consumer inferring one from a signal count.

#![no_std]
#![no_main]

use cortex_m_rt::{entry, exception};
use librertos::queue::Queue;
use librertos::task::Task;
use librertos::tick::{task_delay, tick};
use librertos::types::PEND_FOREVER;
use librertos::{create_task, info, init, start};

static QUEUE: Queue<u32, 8> = Queue::new();

static IDLE: Task = Task::new("idle", 0);
static PRODUCER: Task = Task::new("producer", 15);
static CONSUMER: Task = Task::new("consumer", 10);

fn producer_task_body() -> ! {
    let mut next: u32 = 0;
    loop {
        let _ = QUEUE.send(next, PEND_FOREVER);
        info!("[P] produced #{}", next);
        next = next.wrapping_add(1);
        let _ = task_delay(200);
    }
}

fn consumer_task_body() -> ! {
    loop {
        if let Ok(item) = QUEUE.receive(PEND_FOREVER) {
            info!("[C] consumed #{}", item);
        }
        for _ in 0..10_000 {
            cortex_m::asm::nop();
        }
    }
}

#[exception]
fn SysTick() {
    tick();
}

#[entry]
fn main() -> ! {
    info!("producer-consumer demo");

    init().expect("kernel init failed");
    create_task(&IDLE).unwrap();
    create_task(&PRODUCER).unwrap();
    create_task(&CONSUMER).unwrap();

    info!("starting kernel");
    start().expect("kernel start failed");

    loop {
        cortex_m::asm::wfi();
    }
}
