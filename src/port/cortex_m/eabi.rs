//! Armv7-M EABI code

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use super::{SWITCH, Switch};

/// PendSV Handler for Armv7-M or Armv8-M Mainline EABI
///
/// This is the context switch code. It is called by hardware when the PendSV
/// bit is set and all other interrupts have finished.
///
/// On entry, we will find that xPSR, PC, LR, R12, R3, R2, R1 and R0 have been
/// pushed onto the stack of the code we interrupted: the PSP for a task, the
/// MSP for the ambient context. We push the remaining registers (which are as
/// that code left them) along with our LR, which says which stack it was, and
/// store the resulting stack pointer through `SWITCH.from`. We then do the
/// same in reverse for `SWITCH.to`. Exiting from this function will cause the
/// hardware to restore PC, LR, R12, R3, R2, R1, and R0 from the new stack,
/// and so the new context will resume.
///
/// It is a naked function because we do not want the compiler pushing
/// anything else to the stack and re-using registers containing precious task
/// state.
#[unsafe(no_mangle)]
#[unsafe(naked)]
unsafe extern "C" fn PendSV() {
    // NOTE: This code must NOT touch r4-r11 before they are saved. It can
    // ONLY touch r0-r3 and r12, because those registers were stacked by the
    // hardware on exception entry.

    core::arch::naked_asm!(r#"
    // A SysTick that pends another switch must wait until we are done
    cpsid   i

    // r1 = the address of the pending switch
    ldr     r1, ={switch}

    // r2 = where to save the running code. Nothing to do if it's null.
    ldr     r2, [r1, {from_offset}]
    cbz     r2, 2f

    //
    // Save the running code
    //

    // r0 = the stack it was using (bit 2 of LR is set for the PSP)
    tst     lr, #0x4
    ite     eq
    mrseq   r0, msp
    mrsne   r0, psp

    // Push the additional state into stack at r0
    stmdb   r0!, {{ r4 - r11, lr }}

    // If that was the Main stack, move MSP down past what we just pushed, so
    // other exceptions don't trample it
    tst     lr, #0x4
    it      eq
    msreq   msp, r0

    // save the stack pointer (in r0) to the context, and mark the switch done
    str     r0, [r2]
    movs    r3, #0
    str     r3, [r1, {from_offset}]

    //
    // Resume the next context
    //

    // r0 = the stack pointer from the context
    ldr     r2, [r1, {to_offset}]
    ldr     r0, [r2]

    // Pop the additional state from it
    ldmia   r0!, {{ r4 - r11, lr }}

    // Set whichever stack pointer the restored LR says it was using
    tst     lr, #0x4
    ite     eq
    msreq   msp, r0
    msrne   psp, r0

    2:
    cpsie   i

    //
    // return to the context
    //

    bx      lr
    "#,
    switch = sym SWITCH,
    from_offset = const Switch::FROM_OFFSET,
    to_offset = const Switch::TO_OFFSET,
    );
}

// End of File
