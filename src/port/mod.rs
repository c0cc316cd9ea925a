//! Platform ports
//!
//! The kernel never touches registers or stack pointers itself. A [`Port`]
//! knows how to build a fresh context on a task stack, how to save the running
//! code and resume another context, and how to hold off the timer interrupt
//! while the kernel updates its bookkeeping.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(all(
    target_arch = "arm",
    target_os = "none",
    not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))
))]
pub mod cortex_m;

#[cfg(any(test, feature = "hosted"))]
pub mod hosted;

use crate::Stack;

/// The function a fresh context starts in.
///
/// The kernel supplies this; the port arranges for it to be called with the
/// two arguments given to [`Port::prepare`]. It is `C-unwind` so a panicking
/// task on a hosted port can unwind back out into the host.
pub type TaskEntry = extern "C-unwind" fn(usize, usize);

/// The services the kernel needs from the platform
pub trait Port {
    /// Saved execution state of something that is not running.
    ///
    /// The default value stands for the ambient context: the code that was
    /// running before scheduling began. It only becomes meaningful once it
    /// has been the `from` of a switch.
    type Context: Default;

    /// The smallest task stack, in bytes, this port can start a task on
    const MIN_STACK: usize;

    /// Build a context which, when switched to, calls `entry(arg0, arg1)` on
    /// the given stack.
    ///
    /// # Safety
    ///
    /// Nothing else may use `stack` until the task has terminated and been
    /// switched away from for the last time.
    unsafe fn prepare(&self, stack: &mut Stack, entry: TaskEntry, arg0: usize, arg1: usize)
    -> Self::Context;

    /// Save the running code into `from` and resume `to`.
    ///
    /// Called from task or ambient code, this returns when something switches
    /// back to `from`. Called from an interrupt handler, the switch may only
    /// happen when the handler returns.
    ///
    /// # Safety
    ///
    /// Both pointers must stay valid until the switch is complete, `from`
    /// must describe the running code and `to` must have been prepared or
    /// saved by this port.
    unsafe fn switch(&self, from: *mut Self::Context, to: *const Self::Context);

    /// Resume `to`, abandoning the running code for good.
    ///
    /// May return on ports where the abandoned code has to unwind (e.g. a
    /// host thread); the caller must then do nothing but return.
    ///
    /// # Safety
    ///
    /// As for [`Port::switch`]. Nothing may ever switch back to `from`.
    unsafe fn exit(&self, from: *mut Self::Context, to: *const Self::Context);

    /// Run `f` with the timer interrupt held off
    fn critical<R>(&self, f: impl FnOnce() -> R) -> R;

    /// Drive the liveness indicator (e.g. an LED)
    fn heartbeat(&self, _on: bool) {}
}

/// Something a timer interrupt handler can poke
pub trait TimerTarget {
    /// One timer period has passed
    fn timer_interrupt(&'static self);
}

// End of File
