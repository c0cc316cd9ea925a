//! Contains the [`RoundRobin`] policy

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use alloc::vec::Vec;

use super::{AdmitError, Policy, grow_by_one};
use crate::{TaskId, log};

/// How [`RoundRobin::evict`] treats a task admitted more than once
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum EvictMode {
    /// After removing a match, move on to the next index. The entry that
    /// shifted down into the removed slot is not looked at, so a duplicate
    /// sitting right after a match survives.
    #[default]
    Legacy,
    /// After removing a match, look at the same index again, so every copy
    /// of the task is removed.
    Rescan,
}

/// Hands out admitted tasks in turn, in the order they were admitted.
///
/// There are no priorities: every admitted task gets one turn per lap.
#[derive(Debug)]
pub struct RoundRobin {
    /// Admitted tasks, in admission order. The length is the occupancy.
    tasks: Vec<TaskId>,
    /// How many tasks we may hold
    capacity: usize,
    /// May we grow past `capacity`?
    extensible: bool,
    /// Index of the task we handed out last
    pos: Option<usize>,
    evict_mode: EvictMode,
}

impl RoundRobin {
    /// Make a policy with room for `capacity` tasks.
    ///
    /// If `extensible` is set, admitting a task when full grows the capacity
    /// by one instead of failing.
    pub fn new(capacity: usize, extensible: bool) -> RoundRobin {
        let mut tasks = Vec::new();
        if tasks.try_reserve_exact(capacity).is_err() {
            panic!("Out of memory allocating a round-robin policy");
        }
        RoundRobin {
            tasks,
            capacity,
            extensible,
            pos: None,
            evict_mode: EvictMode::default(),
        }
    }

    /// Choose how duplicate entries are evicted
    pub fn with_evict_mode(mut self, evict_mode: EvictMode) -> RoundRobin {
        self.evict_mode = evict_mode;
        self
    }

    /// How many more tasks fit without growing
    pub fn free(&self) -> usize {
        self.capacity - self.tasks.len()
    }

    /// How many entries are admitted (a task admitted twice counts twice)
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Is nothing admitted?
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// How many tasks fit before we fail or grow
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Is this task admitted at least once?
    pub fn contains(&self, task: TaskId) -> bool {
        self.tasks.contains(&task)
    }

    /// The admitted tasks, in admission order
    pub fn iter(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().copied()
    }
}

impl Policy for RoundRobin {
    fn select(&mut self) -> Option<TaskId> {
        if self.tasks.is_empty() {
            return None;
        }
        let mut next = self.pos.map_or(0, |pos| pos + 1);
        if next >= self.tasks.len() {
            next = 0;
        }
        self.pos = Some(next);
        Some(self.tasks[next])
    }

    fn admit(&mut self, task: TaskId) -> Result<(), AdmitError> {
        if self.tasks.len() == self.capacity {
            if !self.extensible {
                log::debug!("round-robin full, refusing {}", task);
                return Err(AdmitError::Full);
            }
            grow_by_one(&mut self.tasks);
            self.capacity += 1;
            log::trace!("round-robin grew to {=usize}", self.capacity);
        }
        self.tasks.push(task);
        Ok(())
    }

    fn evict(&mut self, task: TaskId) -> bool {
        let mut found = false;
        let mut idx = 0;
        while idx < self.tasks.len() {
            if self.tasks[idx] == task {
                self.tasks.remove(idx);
                found = true;
                if self.evict_mode == EvictMode::Rescan {
                    continue;
                }
            }
            idx += 1;
        }
        found
    }
}


// End of File
