//! Holds the [`Lock`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicBool, Ordering};

/// Stops the kernel switching tasks for as long as it lives.
///
/// The timer interrupt still fires while a `Lock` is held, but the switch
/// protocol resumes whatever was running instead of asking the policy for a
/// new task, and ticks are held back until the lock is gone. This makes short
/// sections of policy bookkeeping atomic with respect to task switching.
///
/// Holding back ticks is visible: a delay countdown read through
/// [`Kernel::with_policy`](crate::Kernel::with_policy) while a `Lock` is held
/// has not yet been decremented for the ticks that arrived under the lock.
/// [`Kernel::now`](crate::Kernel::now) still counts them straight away.
///
/// Locks nest: each one remembers the state it found and puts it back when
/// dropped.
#[must_use = "the lock is released as soon as it is dropped"]
pub struct Lock<'a> {
    flag: &'a AtomicBool,
    prev: bool,
}

impl<'a> Lock<'a> {
    /// Set the switch-inhibit flag, remembering what it was
    ///
    /// Only task code writes the flag, and any task that preempts us puts it
    /// back before we resume, so a plain load and store is enough (and works
    /// on Armv6-M, which has no atomic swap).
    pub(crate) fn new(flag: &'a AtomicBool) -> Lock<'a> {
        let prev = flag.load(Ordering::Acquire);
        flag.store(true, Ordering::Release);
        Lock { flag, prev }
    }
}

impl Drop for Lock<'_> {
    fn drop(&mut self) {
        self.flag.store(self.prev, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_previous_state() {
        let flag = AtomicBool::new(false);
        {
            let _lock = Lock::new(&flag);
            assert!(flag.load(Ordering::Relaxed));
        }
        assert!(!flag.load(Ordering::Relaxed));
    }

    #[test]
    fn nested_locks_only_release_at_the_outermost() {
        let flag = AtomicBool::new(false);
        let outer = Lock::new(&flag);
        {
            let _inner = Lock::new(&flag);
            assert!(flag.load(Ordering::Relaxed));
        }
        assert!(flag.load(Ordering::Relaxed));
        drop(outer);
        assert!(!flag.load(Ordering::Relaxed));
    }

    #[test]
    fn released_on_early_return() {
        fn bail(flag: &AtomicBool) -> Option<()> {
            let _lock = Lock::new(flag);
            None?;
            Some(())
        }
        let flag = AtomicBool::new(false);
        assert!(bail(&flag).is_none());
        assert!(!flag.load(Ordering::Relaxed));
    }
}

// End of File
