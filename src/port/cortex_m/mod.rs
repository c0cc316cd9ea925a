//! A port for Armv7-M and Armv8-M Mainline microcontrollers
//!
//! Tasks run in Thread Mode on the Process Stack. The ambient context (the
//! code that calls [`start`]) runs on the Main Stack. Every switch happens in
//! the PendSV handler, which has the lowest priority, so a switch asked for
//! inside the SysTick handler happens as soon as SysTick returns.
//!
//! Armv6-M and Armv8-M Baseline are not supported.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{
    cell::Cell,
    sync::atomic::{AtomicPtr, AtomicU32, Ordering},
};

use cortex_m::peripheral::{SCB, SYST, scb::SystemHandler};

use super::{Port, TaskEntry, TimerTarget};
use crate::{Kernel, Stack, log, policy::Policy};

#[cfg(arm_abi = "eabi")]
mod eabi;

#[cfg(arm_abi = "eabihf")]
mod eabihf;

mod frame;

use frame::{EXC_RETURN_THREAD_PSP, FramePusher};

/// The saved stack pointer of a suspended context.
///
/// Everything else the context needs is stored on its own stack.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct CortexContext {
    sp: usize,
}

/// The switch the PendSV handler should do next
///
/// Only written with interrupts disabled.
#[repr(C)]
pub(crate) struct Switch {
    /// Where to save the running code. Null when no switch is pending.
    from: AtomicPtr<CortexContext>,
    /// What to resume
    to: AtomicPtr<CortexContext>,
}

impl Switch {
    /// The offset, in bytes, to the `from` field
    pub(crate) const FROM_OFFSET: usize = core::mem::offset_of!(Switch, from);

    /// The offset, in bytes, to the `to` field
    pub(crate) const TO_OFFSET: usize = core::mem::offset_of!(Switch, to);
}

/// The one and only pending switch, read by the free-standing PendSV handler
pub(crate) static SWITCH: Switch = Switch {
    from: AtomicPtr::new(core::ptr::null_mut()),
    to: AtomicPtr::new(core::ptr::null_mut()),
};

/// Who gets told about SysTick
static TIMER: cortex_m::interrupt::Mutex<Cell<Option<&'static (dyn TimerTarget + Sync)>>> =
    cortex_m::interrupt::Mutex::new(Cell::new(None));

/// SysTick interrupts seen, for log timestamps
static TICKS: AtomicU32 = AtomicU32::new(0);

/// Runs tasks on a Cortex-M CPU
#[derive(Debug, Default)]
pub struct CortexM {
    heartbeat: Option<fn(bool)>,
}

impl CortexM {
    /// Make a port with no heartbeat indicator
    pub const fn new() -> CortexM {
        CortexM { heartbeat: None }
    }

    /// Make a port which calls `heartbeat` to drive e.g. an LED
    pub const fn with_heartbeat(heartbeat: fn(bool)) -> CortexM {
        CortexM {
            heartbeat: Some(heartbeat),
        }
    }
}

impl Port for CortexM {
    type Context = CortexContext;

    /// This is the minimum stack we can support, because of the state we need to push
    ///
    /// Make space for seventeen 32-bit registers in the task state, plus some
    /// headroom
    #[cfg(arm_abi = "eabi")]
    const MIN_STACK: usize = (4 * 17) + 8;

    /// This is the minimum stack we can support, because of the state we need to push
    ///
    /// Make space for seventeen 32-bit registers, thirty-two 32-bit FPU
    /// registers, plus FPU status register, in the task state, plus some
    /// headroom
    #[cfg(arm_abi = "eabihf")]
    const MIN_STACK: usize = (4 * 50) + 8;

    unsafe fn prepare(
        &self,
        stack: &mut Stack,
        entry: TaskEntry,
        arg0: usize,
        arg1: usize,
    ) -> CortexContext {
        let top = stack.top();
        // SAFETY: the kernel does not let us make tasks with stacks that are
        // too small.
        let mut pusher = unsafe { FramePusher::new(top) };
        pusher.push_exception_frame(entry as usize, task_returned as usize, arg0, arg1);
        pusher.push_switch_frame(EXC_RETURN_THREAD_PSP);
        log::debug!(
            "Task frame for {=usize} from 0x{=usize:08x} to 0x{=usize:08x}",
            arg1,
            top as usize,
            pusher.current() as usize
        );
        CortexContext {
            sp: pusher.current() as usize,
        }
    }

    unsafe fn switch(&self, from: *mut CortexContext, to: *const CortexContext) {
        cortex_m::interrupt::free(|_| {
            // If a switch is already pending, the code it would save is
            // still the code that is running, so keep its `from`.
            if SWITCH.from.load(Ordering::Relaxed).is_null() {
                SWITCH.from.store(from, Ordering::Relaxed);
            }
            SWITCH.to.store(to.cast_mut(), Ordering::Release);
            SCB::set_pendsv();
        });
        // flush the pipeline so the PendSV fires before we go any further
        cortex_m::asm::isb();
    }

    unsafe fn exit(&self, from: *mut CortexContext, to: *const CortexContext) {
        // PendSV saves the dying task into its own context, which nothing
        // will read again
        unsafe { self.switch(from, to) };
    }

    fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
        cortex_m::interrupt::free(|_| f())
    }

    fn heartbeat(&self, on: bool) {
        if let Some(heartbeat) = self.heartbeat {
            heartbeat(on);
        }
    }
}

/// Where a task goes if its entry trampoline ever returns.
///
/// The kernel always switches away from a finished task first, so getting
/// here means the stack was corrupted.
extern "C" fn task_returned() -> ! {
    panic!("Task returned past the end of its stack");
}

/// Get the number of SysTick interrupts so far
pub fn ticks() -> u32 {
    TICKS.load(Ordering::Relaxed)
}

/// Start the kernel
///
/// Call this from `fn main()` once all your hardware is configured, in
/// Privileged Thread mode on the Main stack. It sets PendSV to the lowest
/// priority, has SysTick fire every `systicks_per_sched_tick` core clock
/// cycles and deliver a tick to `kernel`, and then calls
/// [`Kernel::run`]. It returns whenever no task is ready; in
/// [`Mode::Preemptive`](crate::Mode::Preemptive) a later tick may switch
/// away from the caller again, so a `wfi` loop is a good thing to follow it
/// with.
pub fn start<S>(
    kernel: &'static Kernel<CortexM, S>,
    scb: &mut SCB,
    mut syst: SYST,
    systicks_per_sched_tick: u32,
) where
    S: Policy + Send + 'static,
{
    let installed = cortex_m::interrupt::free(|cs| {
        let timer = TIMER.borrow(cs);
        if timer.get().is_some() {
            return false;
        }
        timer.set(Some(kernel as &'static (dyn TimerTarget + Sync)));
        true
    });
    if !installed {
        panic!("Tried to re-start the kernel!");
    }
    log::info!(
        "Kernel @ {=usize:08x}",
        kernel as *const Kernel<CortexM, S> as usize
    );

    // SAFETY: PendSV at the lowest priority can only make switches happen
    // later, never break a critical section
    unsafe {
        scb.set_priority(SystemHandler::PendSV, 0xFF);
    }

    // Must do this /after/ installing the kernel because the SysTick
    // exception handler will use it
    syst.set_reload(systicks_per_sched_tick);
    syst.set_clock_source(cortex_m::peripheral::syst::SystClkSource::Core);
    syst.clear_current();
    syst.enable_counter();
    syst.enable_interrupt();

    kernel.run();
}

/// SysTick Handler
#[unsafe(no_mangle)]
extern "C" fn SysTick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
    let target = cortex_m::interrupt::free(|cs| TIMER.borrow(cs).get());
    if let Some(target) = target {
        target.timer_interrupt();
    }
}

// End of File
