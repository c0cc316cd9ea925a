//! Holds the [`Stack`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use alloc::{boxed::Box, vec::Vec};

/// A private task stack, allocated on the heap when a task is spawned.
///
/// We store the memory as 64-bit words so the stack is always aligned on an
/// 8-byte boundary, as required by AAPCS.
pub struct Stack {
    /// The memory reserved for the task stack
    contents: Box<[u64]>,
}

impl Stack {
    /// Allocate a new stack of at least `bytes` bytes.
    ///
    /// The size is rounded up to a multiple of 8. Running out of heap here is
    /// fatal: there is no sensible way to carry on without the stack.
    pub fn new(bytes: usize) -> Stack {
        let words = bytes.div_ceil(8);
        let mut contents = Vec::new();
        if contents.try_reserve_exact(words).is_err() {
            panic!("Out of memory allocating a {} byte task stack", bytes);
        }
        contents.resize(words, 0u64);
        Stack {
            contents: contents.into_boxed_slice(),
        }
    }

    /// How many bytes this stack holds
    pub fn len_bytes(&self) -> usize {
        self.contents.len() * 8
    }

    /// Get the top of the stack
    ///
    /// This is one past the end of the buffer, as these are full descending
    /// stacks and the top address itself is never written.
    pub fn top(&mut self) -> *mut u32 {
        self.contents.as_mut_ptr_range().end as *mut u32
    }

    /// Fill the stack with zeroes, ready for a new task
    pub(crate) fn clear(&mut self) {
        self.contents.fill(0);
    }
}

impl core::fmt::Debug for Stack {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "Stack({} bytes)", self.len_bytes())
    }
}


// End of File
