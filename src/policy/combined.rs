//! Contains the [`Combined`] policy

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{AdmitError, DelayOrdered, DelayPolicy, Policy, RoundRobin};
use crate::{TaskId, log};

/// What [`Combined`] does with a delayed task once it is due
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Promotion {
    /// Leave the task in the delay policy. Its countdown stays at zero, so it
    /// is selected and added to the round-robin again on every call to
    /// `select`, until it is evicted or its countdown is reset.
    #[default]
    Repeated,
    /// Move the task out of the delay policy as it joins the round-robin, so
    /// it is promoted exactly once.
    Once,
}

/// A [`DelayOrdered`] policy in front of a [`RoundRobin`] policy.
///
/// Plain tasks go into the round-robin. Delayed tasks wait in the delay
/// policy, and when due they are added to the round-robin and run.
#[derive(Debug)]
pub struct Combined {
    delayed: DelayOrdered,
    round: RoundRobin,
    promotion: Promotion,
}

impl Combined {
    /// Combine two policies, using [`Promotion::Repeated`]
    pub fn new(delayed: DelayOrdered, round: RoundRobin) -> Combined {
        Combined {
            delayed,
            round,
            promotion: Promotion::default(),
        }
    }

    /// Choose what happens to a delayed task once it is due
    pub fn with_promotion(mut self, promotion: Promotion) -> Combined {
        self.promotion = promotion;
        self
    }

    /// Which promotion behaviour is active
    pub fn promotion(&self) -> Promotion {
        self.promotion
    }

    /// The delay policy, for inspection
    pub fn delayed(&self) -> &DelayOrdered {
        &self.delayed
    }

    /// The delay policy, e.g. to reset a countdown
    pub fn delayed_mut(&mut self) -> &mut DelayOrdered {
        &mut self.delayed
    }

    /// The round-robin policy, for inspection
    pub fn round(&self) -> &RoundRobin {
        &self.round
    }
}

impl Policy for Combined {
    fn select(&mut self) -> Option<TaskId> {
        let Some(task) = self.delayed.select() else {
            return self.round.select();
        };
        match self.round.admit(task) {
            Ok(()) => {
                log::trace!("promoted {}", task);
                if self.promotion == Promotion::Once {
                    self.delayed.evict(task);
                }
            }
            Err(_e) => {
                log::warning!("could not promote {}: {}", task, _e);
            }
        }
        Some(task)
    }

    fn admit(&mut self, task: TaskId) -> Result<(), AdmitError> {
        self.round.admit(task)
    }

    fn evict(&mut self, task: TaskId) -> bool {
        let from_delayed = self.delayed.evict(task);
        let from_round = self.round.evict(task);
        from_delayed || from_round
    }

    fn tick(&mut self) {
        self.delayed.tick();
    }
}

impl DelayPolicy for Combined {
    fn admit_delayed(
        &mut self,
        task: TaskId,
        countdown: u32,
        retry_on_collision: bool,
    ) -> Result<u32, AdmitError> {
        self.delayed
            .admit_delayed(task, countdown, retry_on_collision)
    }
}


// End of File
