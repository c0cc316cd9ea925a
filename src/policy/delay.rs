//! Contains the [`DelayOrdered`] policy

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use alloc::vec::Vec;

use super::{AdmitError, DelayPolicy, Policy, grow_by_one};
use crate::{TaskId, log};

/// A task waiting for its countdown to run out
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Waiting {
    task: TaskId,
    countdown: u32,
}

/// Holds tasks that become ready once their countdown reaches zero.
///
/// Every [`tick`](Policy::tick) takes one off each countdown. No two tasks
/// share a countdown at the moment they are admitted, but as they all count
/// down together they can meet later; then the one in the lowest slot wins.
///
/// A task stays here after its countdown reaches zero, and keeps being
/// selected, until it is evicted or its countdown is reset.
#[derive(Debug)]
pub struct DelayOrdered {
    slots: Vec<Option<Waiting>>,
    /// May we add a slot when they are all occupied?
    extensible: bool,
}

impl DelayOrdered {
    /// Make a policy with `capacity` slots.
    ///
    /// If `extensible` is set, admitting a task when every slot is occupied
    /// adds one slot instead of failing.
    pub fn new(capacity: usize, extensible: bool) -> DelayOrdered {
        let mut slots = Vec::new();
        if slots.try_reserve_exact(capacity).is_err() {
            panic!("Out of memory allocating a delay-ordered policy");
        }
        slots.resize(capacity, None);
        DelayOrdered { slots, extensible }
    }

    /// How many slots hold a task
    pub fn occupied(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// How many slots there are
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The countdown of a held task
    pub fn countdown(&self, task: TaskId) -> Option<u32> {
        self.waiting().find(|w| w.task == task).map(|w| w.countdown)
    }

    /// Give a held task a new countdown. Returns `false` if we don't hold it.
    ///
    /// This does not check for collisions: countdowns are only unique at the
    /// moment of admission.
    pub fn set_countdown(&mut self, task: TaskId, countdown: u32) -> bool {
        let mut found = false;
        for w in self.slots.iter_mut().flatten().filter(|w| w.task == task) {
            w.countdown = countdown;
            found = true;
        }
        found
    }

    fn waiting(&self) -> impl Iterator<Item = &Waiting> {
        self.slots.iter().flatten()
    }

    /// Find a countdown no held task has, starting from `countdown`
    fn resolve(&self, mut countdown: u32, retry_on_collision: bool) -> Result<u32, AdmitError> {
        while self.waiting().any(|w| w.countdown == countdown) {
            if !retry_on_collision {
                return Err(AdmitError::Collision);
            }
            countdown = countdown
                .checked_add(1)
                .ok_or(AdmitError::CountdownOverflow)?;
        }
        Ok(countdown)
    }
}

impl Policy for DelayOrdered {
    fn select(&mut self) -> Option<TaskId> {
        self.waiting()
            .find(|w| w.countdown == 0)
            .map(|w| w.task)
    }

    /// Admit a task that is ready straight away (or as soon as the lowest
    /// free countdown runs out).
    fn admit(&mut self, task: TaskId) -> Result<(), AdmitError> {
        self.admit_delayed(task, 0, true).map(|_| ())
    }

    fn evict(&mut self, task: TaskId) -> bool {
        let mut found = false;
        for slot in self.slots.iter_mut() {
            if slot.is_some_and(|w| w.task == task) {
                *slot = None;
                found = true;
            }
        }
        found
    }

    fn tick(&mut self) {
        for w in self.slots.iter_mut().flatten() {
            w.countdown = w.countdown.saturating_sub(1);
        }
    }
}

impl DelayPolicy for DelayOrdered {
    fn admit_delayed(
        &mut self,
        task: TaskId,
        countdown: u32,
        retry_on_collision: bool,
    ) -> Result<u32, AdmitError> {
        let full = self.slots.iter().all(Option::is_some);
        if full && !self.extensible {
            log::debug!("delay policy full, refusing {}", task);
            return Err(AdmitError::Full);
        }

        let countdown = self.resolve(countdown, retry_on_collision)?;

        if full {
            grow_by_one(&mut self.slots);
            self.slots.push(None);
            log::trace!("delay policy grew to {=usize}", self.slots.len());
        }

        // there is a free slot now, one way or another
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(Waiting { task, countdown });
        }
        log::trace!("{} waits {=u32} ticks", task, countdown);
        Ok(countdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::test_ids::{A, B, C, D};

    #[test]
    fn selects_nothing_until_due() {
        let mut p = DelayOrdered::new(2, false);
        assert_eq!(p.admit_delayed(A, 2, false), Ok(2));
        assert_eq!(p.select(), None);
        p.tick();
        assert_eq!(p.select(), None);
        p.tick();
        assert_eq!(p.select(), Some(A));
    }

    #[test]
    fn countdown_never_goes_below_zero() {
        let mut p = DelayOrdered::new(1, false);
        p.admit_delayed(A, 3, false).unwrap();
        for _ in 0..10 {
            p.tick();
        }
        assert_eq!(p.countdown(A), Some(0));
        assert_eq!(p.select(), Some(A));
    }

    #[test]
    fn n_ticks_make_any_countdown_up_to_n_due() {
        for c in 0..8 {
            for n in c..10 {
                let mut p = DelayOrdered::new(1, false);
                p.admit_delayed(A, c, false).unwrap();
                for _ in 0..n {
                    p.tick();
                }
                assert_eq!(p.select(), Some(A), "countdown {} after {} ticks", c, n);
                p.tick();
                assert_eq!(p.countdown(A), Some(0));
            }
        }
    }

    #[test]
    fn collision_without_retry_fails_and_changes_nothing() {
        let mut p = DelayOrdered::new(3, false);
        p.admit_delayed(A, 5, false).unwrap();
        assert_eq!(p.admit_delayed(B, 5, false), Err(AdmitError::Collision));
        assert_eq!(p.occupied(), 1);
        assert_eq!(p.countdown(B), None);
    }

    #[test]
    fn collision_with_retry_finds_next_free_countdown() {
        let mut p = DelayOrdered::new(4, false);
        p.admit_delayed(A, 5, true).unwrap();
        p.admit_delayed(B, 6, true).unwrap();
        p.admit_delayed(C, 4, true).unwrap();
        // 5 and 6 are taken, so D ends up on 7
        assert_eq!(p.admit_delayed(D, 5, true), Ok(7));
        assert_eq!(p.countdown(D), Some(7));
    }

    #[test]
    fn retry_rescans_from_the_first_slot() {
        let mut p = DelayOrdered::new(3, false);
        // slot 0 holds 2, slot 1 holds 1: bumping 1 -> 2 must recheck slot 0
        p.admit_delayed(A, 2, true).unwrap();
        p.admit_delayed(B, 1, true).unwrap();
        assert_eq!(p.admit_delayed(C, 1, true), Ok(3));
    }

    #[test]
    fn retried_countdowns_are_unique_at_admission() {
        let mut p = DelayOrdered::new(0, true);
        let requested = [3u32, 3, 0, 4, 3, 1, 0, 9, 4];
        for (idx, c) in requested.iter().enumerate() {
            p.admit_delayed(crate::TaskId::new(idx, 0), *c, true).unwrap();
            let mut seen: Vec<u32> = p.waiting().map(|w| w.countdown).collect();
            let total = seen.len();
            seen.sort_unstable();
            seen.dedup();
            assert_eq!(seen.len(), total);
        }
    }

    #[test]
    fn countdown_overflow_is_reported() {
        let mut p = DelayOrdered::new(2, false);
        p.admit_delayed(A, u32::MAX, false).unwrap();
        assert_eq!(
            p.admit_delayed(B, u32::MAX, true),
            Err(AdmitError::CountdownOverflow)
        );
    }

    #[test]
    fn full_fixed_policy_refuses_and_is_unchanged() {
        let mut p = DelayOrdered::new(1, false);
        p.admit_delayed(A, 1, false).unwrap();
        assert_eq!(p.admit_delayed(B, 2, true), Err(AdmitError::Full));
        assert_eq!(p.capacity(), 1);
        assert_eq!(p.occupied(), 1);
        assert_eq!(p.countdown(A), Some(1));
    }

    #[test]
    fn extensible_policy_grows_by_one() {
        let mut p = DelayOrdered::new(1, true);
        p.admit_delayed(A, 1, false).unwrap();
        p.admit_delayed(B, 2, false).unwrap();
        assert_eq!(p.capacity(), 2);
        assert_eq!(p.occupied(), 2);
    }

    #[test]
    fn lowest_slot_wins_when_countdowns_meet() {
        let mut p = DelayOrdered::new(2, false);
        p.admit_delayed(A, 3, false).unwrap();
        p.admit_delayed(B, 1, false).unwrap();
        p.tick();
        assert_eq!(p.select(), Some(B));
        // A is in slot 0, so once both are zero A comes first
        p.tick();
        p.tick();
        assert_eq!(p.select(), Some(A));
    }

    #[test]
    fn evict_frees_the_slot() {
        let mut p = DelayOrdered::new(2, false);
        p.admit_delayed(A, 0, false).unwrap();
        p.admit_delayed(B, 1, false).unwrap();
        assert!(p.evict(A));
        assert!(!p.evict(A));
        assert_eq!(p.occupied(), 1);
        // the freed slot 0 is the first empty one
        p.admit_delayed(C, 0, false).unwrap();
        assert_eq!(p.select(), Some(C));
    }

    #[test]
    fn set_countdown_resets_a_due_task() {
        let mut p = DelayOrdered::new(1, false);
        p.admit(A).unwrap();
        assert_eq!(p.select(), Some(A));
        assert!(p.set_countdown(A, 2));
        assert_eq!(p.select(), None);
        assert!(!p.set_countdown(B, 2));
    }
}

// End of File
