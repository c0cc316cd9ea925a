//! # rota: a small task scheduler for single-core microcontrollers
//!
//! Each task is a closure running on its own heap-allocated stack. A
//! [`Kernel`] decides at every switch point which task to resume, by asking a
//! pluggable [`Policy`](policy::Policy). Switching happens when a task calls
//! [`Kernel::yield_now`] and, in [`Mode::Preemptive`], on every timer tick.
//!
//! ```rust,ignore
//! static KERNEL: ... = ...;
//!
//! let kernel = Kernel::builder(CortexM::new())
//!     .mode(Mode::Preemptive)
//!     .build(Combined::new(DelayOrdered::new(4, true), RoundRobin::new(4, true)));
//! let task = kernel.spawn(1024, || loop { defmt::info!("Hello!"); })?;
//! kernel.admit(task)?;
//! ```
//!
//! The platform specifics live behind the [`Port`](port::Port) trait. There
//! is a port for Armv7-M and Armv8-M Mainline, and one that runs each task on
//! a host thread (with the `hosted` feature, and always in the unit tests).

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "hosted"))]
extern crate std;

mod kernel;
mod lock;
mod log;
mod stack;
mod task;

pub mod policy;
pub mod port;

pub use kernel::{Config, Kernel, KernelBuilder, Mode, SpawnError};
pub use lock::Lock;
pub use stack::Stack;
pub use task::{TaskFn, TaskId, TaskState};

// End of File
