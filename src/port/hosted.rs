//! A port that runs on a host operating system
//!
//! Each started task gets its own host thread, but only one thread is ever
//! allowed to run: a switch hands a baton to the thread being resumed and then
//! waits for the baton to come back. The code that calls
//! [`Kernel::run`](crate::Kernel::run) is the ambient context.
//!
//! There is no real timer here. Code that wants to be "interrupted" calls
//! [`Kernel::timer_interrupt`](crate::Kernel::timer_interrupt) at the point
//! where the interrupt should land.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{
    format,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread,
    vec::Vec,
};

use super::{Port, TaskEntry};
use crate::Stack;

/// Host threads need far more stack than a microcontroller task, so we never
/// give them less than this.
const HOST_THREAD_STACK: usize = 256 * 1024;

/// Lock a mutex, ignoring poisoning: a panicking task must not wedge the
/// scheduler.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Permission to run, passed from thread to thread
#[derive(Debug, Default)]
struct Baton {
    held: Mutex<bool>,
    wake: Condvar,
}

impl Baton {
    /// Let the owner of this baton run
    fn pass(&self) {
        *lock(&self.held) = true;
        self.wake.notify_one();
    }

    /// Block until somebody passes us the baton
    fn wait(&self) {
        let mut held = lock(&self.held);
        while !*held {
            held = self.wake.wait(held).unwrap_or_else(PoisonError::into_inner);
        }
        *held = false;
    }
}

/// A suspended host thread, or the ambient thread
#[derive(Debug, Default)]
pub struct HostContext {
    baton: Arc<Baton>,
}

/// Runs tasks on host threads, one at a time
#[derive(Debug, Default)]
pub struct Hosted {
    heartbeats: Mutex<Vec<bool>>,
}

impl Hosted {
    /// Make a new host port
    pub fn new() -> Hosted {
        Hosted::default()
    }

    /// Every heartbeat level the kernel has set, oldest first
    pub fn heartbeats(&self) -> Vec<bool> {
        lock(&self.heartbeats).clone()
    }
}

impl Port for Hosted {
    type Context = HostContext;

    const MIN_STACK: usize = 64;

    unsafe fn prepare(
        &self,
        stack: &mut Stack,
        entry: TaskEntry,
        arg0: usize,
        arg1: usize,
    ) -> HostContext {
        let context = HostContext::default();
        let baton = context.baton.clone();
        let result = thread::Builder::new()
            .name(format!("task-{}", arg1))
            .stack_size(stack.len_bytes().max(HOST_THREAD_STACK))
            .spawn(move || {
                baton.wait();
                entry(arg0, arg1);
            });
        if let Err(e) = result {
            panic!("Failed to start a host thread for task {}: {}", arg1, e);
        }
        context
    }

    unsafe fn switch(&self, from: *mut HostContext, to: *const HostContext) {
        // Take our own references to both batons before letting the other
        // thread run, as it is free to change the kernel state from then on.
        let (from, to) = unsafe { ((*from).baton.clone(), (*to).baton.clone()) };
        to.pass();
        from.wait();
    }

    unsafe fn exit(&self, _from: *mut HostContext, to: *const HostContext) {
        let to = unsafe { (*to).baton.clone() };
        to.pass();
    }

    fn critical<R>(&self, f: impl FnOnce() -> R) -> R {
        // Only the baton holder runs, and our "interrupts" are plain calls
        f()
    }

    fn heartbeat(&self, on: bool) {
        lock(&self.heartbeats).push(on);
    }
}


// End of File
