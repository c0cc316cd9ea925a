//! Holds the [`TaskId`] type and the kernel's task pool

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use alloc::{boxed::Box, vec::Vec};

use crate::Stack;

/// The code a task runs. Returning from it ends the task.
pub type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a task in a kernel's task pool.
///
/// A pool slot can be re-used once its task has terminated, so each id also
/// carries the generation of the slot it was issued for. An id from an earlier
/// generation never matches the new occupant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskId {
    index: u16,
    generation: u16,
}

impl TaskId {
    pub(crate) const fn new(index: usize, generation: u16) -> TaskId {
        TaskId {
            index: index as u16,
            generation,
        }
    }

    /// Which pool slot this task lives in
    pub const fn index(self) -> usize {
        self.index as usize
    }

}

#[cfg(target_os = "none")]
impl defmt::Format for TaskId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "T{=u16:03}.{=u16}", self.index, self.generation);
    }
}

impl core::fmt::Display for TaskId {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "T{:03}.{}", self.index, self.generation)
    }
}

/// Where a task slot is in its lifecycle
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum TaskState {
    /// Nobody has ever spawned a task into this slot
    Free,
    /// Spawned, but never selected. There is no saved context yet.
    Created,
    /// Selected at least once. The saved context is valid whenever the task
    /// is not the one running.
    Started,
    /// The entry function returned. The slot can be re-used.
    Terminated,
}

impl TaskState {
    /// Can a policy hand this task to the switch protocol?
    pub const fn is_live(self) -> bool {
        matches!(self, TaskState::Created | TaskState::Started)
    }
}

/// One entry in the task pool
pub(crate) struct TaskSlot<C> {
    /// Saved execution state, valid once the task has been started
    pub(crate) context: C,
    pub(crate) state: TaskState,
    pub(crate) generation: u16,
    /// The entry function, taken when the task first runs
    pub(crate) entry_fn: Option<TaskFn>,
    pub(crate) stack: Option<Stack>,
}

impl<C: Default> TaskSlot<C> {
    fn empty() -> TaskSlot<C> {
        TaskSlot {
            context: C::default(),
            state: TaskState::Free,
            generation: 0,
            entry_fn: None,
            stack: None,
        }
    }
}

/// A fixed-size arena of task slots.
///
/// The slot array is allocated once and never moves, so the port may hold raw
/// pointers to a slot's saved context across a switch.
pub(crate) struct TaskPool<C> {
    slots: Box<[TaskSlot<C>]>,
}

impl<C: Default> TaskPool<C> {
    /// Make a pool with room for `size` tasks
    pub(crate) fn new(size: usize) -> TaskPool<C> {
        assert!(size <= usize::from(u16::MAX), "Too many task slots");
        let mut slots = Vec::new();
        if slots.try_reserve_exact(size).is_err() {
            panic!("Out of memory allocating {} task slots", size);
        }
        slots.resize_with(size, TaskSlot::empty);
        TaskPool {
            slots: slots.into_boxed_slice(),
        }
    }

    /// Put a new task into the first slot that is Free or Terminated.
    ///
    /// Returns `None` if every slot holds a live task. The old stack is
    /// re-used if it is big enough.
    pub(crate) fn insert(&mut self, stack_bytes: usize, entry_fn: TaskFn) -> Option<TaskId> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| !slot.state.is_live())?;

        if slot.state == TaskState::Terminated {
            slot.generation = slot.generation.wrapping_add(1);
        }

        let stack = match slot.stack.take() {
            Some(mut stack) if stack.len_bytes() >= stack_bytes => {
                stack.clear();
                stack
            }
            _ => Stack::new(stack_bytes),
        };

        slot.stack = Some(stack);
        slot.entry_fn = Some(entry_fn);
        slot.context = C::default();
        slot.state = TaskState::Created;
        Some(TaskId::new(index, slot.generation))
    }
}

impl<C> TaskPool<C> {
    /// Look up the slot for an id, if the id is still current
    pub(crate) fn get(&self, id: TaskId) -> Option<&TaskSlot<C>> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation && slot.state != TaskState::Free)
    }

    /// Is this id the current occupant of a live slot?
    pub(crate) fn is_live(&self, id: TaskId) -> bool {
        self.get(id).is_some_and(|slot| slot.state.is_live())
    }

    /// The id of whatever occupies the slot at `index`
    pub(crate) fn id_at(&self, index: usize) -> TaskId {
        TaskId::new(index, self.slots[index].generation)
    }

    /// Access a slot by index
    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut TaskSlot<C> {
        &mut self.slots[index]
    }

    /// How many slots hold a live task
    pub(crate) fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.state.is_live()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nothing() -> TaskFn {
        Box::new(|| {})
    }

    #[test]
    fn insert_fills_slots_in_order() {
        let mut pool: TaskPool<u32> = TaskPool::new(2);
        let a = pool.insert(64, nothing()).unwrap();
        let b = pool.insert(64, nothing()).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert!(pool.insert(64, nothing()).is_none());
        assert_eq!(pool.live(), 2);
    }

    #[test]
    fn terminated_slot_is_reused_with_new_generation() {
        let mut pool: TaskPool<u32> = TaskPool::new(1);
        let old = pool.insert(128, nothing()).unwrap();
        pool.slot_mut(old.index()).state = TaskState::Terminated;
        assert!(!pool.is_live(old));

        let new = pool.insert(64, nothing()).unwrap();
        assert_eq!(new.index(), old.index());
        assert_ne!(new, old);
        assert!(pool.is_live(new));
        assert!(pool.get(old).is_none());
        // the 128 byte stack was big enough to keep
        assert_eq!(pool.get(new).unwrap().stack.as_ref().unwrap().len_bytes(), 128);
    }

    #[test]
    fn small_stack_is_replaced_on_reuse() {
        let mut pool: TaskPool<u32> = TaskPool::new(1);
        let old = pool.insert(64, nothing()).unwrap();
        pool.slot_mut(old.index()).state = TaskState::Terminated;
        let new = pool.insert(256, nothing()).unwrap();
        assert_eq!(pool.get(new).unwrap().stack.as_ref().unwrap().len_bytes(), 256);
    }

    #[test]
    fn ids_display_like_the_logs() {
        let id = TaskId::new(4, 2);
        assert_eq!(alloc::format!("{}", id), "T004.2");
    }
}

// End of File
