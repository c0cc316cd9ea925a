//! Three tasks sharing the CPU in a preemptive round-robin
//!
//! Each task prints a defmt log and then gives up the rest of its turn. The
//! cat gets bored after a while, and once all the tasks have finished the
//! demo exits.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

extern crate alloc;

use alloc::boxed::Box;

use rota::{
    Kernel, Mode,
    policy::RoundRobin,
    port::cortex_m::{self as port, CortexM},
};

const SYSTICKS_PER_SCHED_TICK: u32 = 100_000;

type Demo = Kernel<CortexM, RoundRobin>;

#[cortex_m_rt::entry]
fn main() -> ! {
    rota_demos::init_heap();
    let mut cp = cortex_m::Peripherals::take().unwrap();
    defmt::info!("Hello!");

    let kernel: &'static Demo = Box::leak(Box::new(
        Kernel::builder(CortexM::with_heartbeat(heartbeat))
            .mode(Mode::Preemptive)
            .max_tasks(3)
            .heartbeat_period(10)
            .build(RoundRobin::new(3, false)),
    ));
    defmt::info!(
        "{} kernel with {=usize} task slots",
        kernel.config().mode,
        kernel.config().max_tasks
    );

    let tasks = [
        kernel.spawn(1024, move || rabbits(kernel)).unwrap(),
        kernel.spawn(1024, move || hamsters(kernel)).unwrap(),
        kernel.spawn(1024, move || cats(kernel)).unwrap(),
    ];
    for task in tasks {
        kernel.admit(task).unwrap();
    }

    port::start(kernel, &mut cp.SCB, cp.SYST, SYSTICKS_PER_SCHED_TICK);

    defmt::info!("All tasks finished at tick {=u32}", kernel.now());
    semihosting::process::exit(0);
}

fn heartbeat(on: bool) {
    defmt::info!("Heartbeat {=bool}", on);
}

/// Our 'rabbit' task
fn rabbits(kernel: &'static Demo) {
    for lap in 0..20 {
        defmt::info!("Rabbit! {=u32}", lap);
        kernel.yield_now();
    }
}

/// Our 'hamster' task
fn hamsters(kernel: &'static Demo) {
    for lap in 0..20 {
        defmt::info!("Hamster! {=u32}", lap);
        kernel.yield_now();
    }
}

/// Our 'cat' task
fn cats(kernel: &'static Demo) {
    for lap in 0..5 {
        defmt::info!("Cat! {=u32}", lap);
        kernel.yield_now();
    }
    defmt::info!("Cat is bored");
}

// End of File
