//! Holds the [`FramePusher`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// The value of the Processor Status Register when a task starts
///
/// The only bit we need to set is the T bit, to indicate that the task should
/// run in Thumb mode (the only supported mode on M-profile)
const DEFAULT_XPSR: u32 = 1 << 24;

/// Exception return value for Thread Mode, Process Stack, no FPU state.
///
/// It does not have the FPU bit set, so we don't need to push an Extended
/// Frame, or the high FPU registers, into the initial state.
pub(crate) const EXC_RETURN_THREAD_PSP: u32 = 0xFFFF_FFFD;

/// Builds the initial saved state of a task in a full-descending Arm EABI
/// stack.
pub(crate) struct FramePusher(*mut u32);

impl FramePusher {
    /// Start pushing below the given pointer
    ///
    /// It will not write to the given pointer, but it will write immediately
    /// below it, because this is a Full Descending stack.
    ///
    /// # Safety
    ///
    /// There must be enough free space below the given pointer to accept all
    /// the items you are going to push.
    pub(crate) unsafe fn new(stack_top: *mut u32) -> FramePusher {
        FramePusher(stack_top)
    }

    /// Push one word
    pub(crate) fn push(&mut self, value: u32) {
        // SAFETY: `new` made the caller promise us the space
        unsafe {
            self.0 = self.0.offset(-1);
            self.0.write_volatile(value);
        }
    }

    /// Push the frame the hardware pops on exception return.
    ///
    /// Returning from PendSV through this frame calls `pc(r0, r1)`, and if
    /// that function ever returns it goes to `lr`.
    pub(crate) fn push_exception_frame(&mut self, pc: usize, lr: usize, r0: usize, r1: usize) {
        self.push(DEFAULT_XPSR);
        // The hardware wants the PC without the Thumb bit
        self.push(pc as u32 & !1);
        self.push(lr as u32);
        // R12
        self.push(0);
        // R3, R2
        self.push(0);
        self.push(0);
        self.push(r1 as u32);
        self.push(r0 as u32);
    }

    /// Push what PendSV pushes on top of the hardware frame: a copy of the
    /// exception return value and R4 to R11.
    pub(crate) fn push_switch_frame(&mut self, exc_return: u32) {
        self.push(exc_return);
        for _ in 4..=11 {
            self.push(0);
        }
    }

    /// Get the current stack pointer
    pub(crate) fn current(&self) -> *mut u32 {
        self.0
    }
}

// End of File
