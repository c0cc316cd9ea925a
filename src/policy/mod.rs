//! Scheduling policies
//!
//! A policy only decides *which* admitted task runs next. It never switches
//! tasks itself: the [`Kernel`](crate::Kernel) asks it, then does the switch.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

mod combined;
mod delay;
mod round_robin;

pub use combined::{Combined, Promotion};
pub use delay::DelayOrdered;
pub use round_robin::{EvictMode, RoundRobin};

use crate::TaskId;

/// Something that picks the next task to run from the tasks admitted to it
pub trait Policy {
    /// Pick the next task to run, or `None` if nothing is ready
    fn select(&mut self) -> Option<TaskId>;

    /// Start scheduling a task
    fn admit(&mut self, task: TaskId) -> Result<(), AdmitError>;

    /// Stop scheduling a task. Returns `true` if the task was found.
    fn evict(&mut self, task: TaskId) -> bool;

    /// One timer period has passed
    ///
    /// Policies without a notion of time ignore this.
    fn tick(&mut self) {}
}

/// A policy that can hold tasks which only become ready after a countdown
pub trait DelayPolicy: Policy {
    /// Admit a task which becomes ready after `countdown` ticks.
    ///
    /// If another held task already has the same countdown, either fail (if
    /// `retry_on_collision` is false) or keep adding one tick until the
    /// countdown is unique. Returns the countdown the task was admitted with.
    fn admit_delayed(
        &mut self,
        task: TaskId,
        countdown: u32,
        retry_on_collision: bool,
    ) -> Result<u32, AdmitError>;
}

/// Why a task could not be admitted to a policy
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum AdmitError {
    /// The policy is at capacity and is not allowed to grow
    Full,
    /// Another task already has this countdown and retrying was not allowed
    Collision,
    /// Retrying after a collision ran off the end of the countdown range
    CountdownOverflow,
    /// The id does not refer to a live task
    NotLive,
}

impl core::fmt::Display for AdmitError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            AdmitError::Full => "policy is full",
            AdmitError::Collision => "another task has the same countdown",
            AdmitError::CountdownOverflow => "no free countdown left",
            AdmitError::NotLive => "not a live task",
        };
        fmt.write_str(msg)
    }
}

impl core::error::Error for AdmitError {}

/// Reserve room for exactly one more entry, or die trying.
///
/// Running out of memory while growing a policy leaves nothing sensible to
/// schedule, so this is fatal.
pub(crate) fn grow_by_one<T>(v: &mut alloc::vec::Vec<T>) {
    if v.try_reserve_exact(1).is_err() {
        panic!("Out of memory growing a scheduling policy");
    }
}


// End of File
