//! Tasks that sleep for a number of ticks, next to one that never sleeps
//!
//! Sleeping is done by moving the running task out of the round-robin and
//! into the delay policy, with switching held off while we do it.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

extern crate alloc;

use alloc::boxed::Box;

use rota::{
    Kernel, Mode,
    policy::{Combined, DelayOrdered, Promotion, RoundRobin},
    port::cortex_m::{self as port, CortexM},
};

const SYSTICKS_PER_SCHED_TICK: u32 = 100_000;

type Demo = Kernel<CortexM, Combined>;

#[cortex_m_rt::entry]
fn main() -> ! {
    rota_demos::init_heap();
    let mut cp = cortex_m::Peripherals::take().unwrap();
    defmt::info!("Hello!");

    let policy = Combined::new(DelayOrdered::new(2, true), RoundRobin::new(3, true))
        .with_promotion(Promotion::Once);
    let kernel: &'static Demo = Box::leak(Box::new(
        Kernel::builder(CortexM::new())
            .mode(Mode::Preemptive)
            .max_tasks(3)
            .build(policy),
    ));

    let rabbit = kernel.spawn(1024, move || rabbits(kernel)).unwrap();
    let hamster = kernel.spawn(1024, move || hamsters(kernel)).unwrap();
    let dog = kernel.spawn(1024, move || dogs(kernel)).unwrap();
    kernel.admit(rabbit).unwrap();
    kernel.admit_delayed(hamster, 10, true).unwrap();
    kernel.admit(dog).unwrap();

    port::start(kernel, &mut cp.SCB, cp.SYST, SYSTICKS_PER_SCHED_TICK);

    // In between sleeps there may be nothing to run, so keep waiting for
    // ticks until every task has finished
    while kernel.live_tasks() > 0 {
        cortex_m::asm::wfi();
    }
    defmt::info!("All tasks finished at tick {=u32}", kernel.now());
    semihosting::process::exit(0);
}

/// Stop running for at least `ticks` ticks
fn sleep(kernel: &'static Demo, ticks: u32) {
    {
        let _lock = kernel.lock();
        let Some(me) = kernel.current() else {
            return;
        };
        kernel.evict(me);
        if let Err(e) = kernel.admit_delayed(me, ticks, true) {
            panic!("Could not sleep: {}", e);
        }
    }
    kernel.yield_now();
}

/// Our 'rabbit' task
fn rabbits(kernel: &'static Demo) {
    for _ in 0..10 {
        defmt::info!("Rabbit! (back in 5)");
        sleep(kernel, 5);
    }
}

/// Our 'hamster' task
fn hamsters(kernel: &'static Demo) {
    for _ in 0..5 {
        defmt::info!("Hamster! (back in 10)");
        sleep(kernel, 10);
    }
}

/// Our 'dog' task, which never sleeps but gives way when asked
fn dogs(kernel: &'static Demo) {
    let start = kernel.now();
    while kernel.now().wrapping_sub(start) < 40 {
        defmt::trace!("Dog!");
        kernel.yield_now();
    }
    defmt::info!("Dog is tired");
}

// End of File
