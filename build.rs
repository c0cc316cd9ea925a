//! Build script for rota
//!
//! Works out which Arm ABI and architecture we are building for, so the
//! Cortex-M port can pick the right PendSV handler. On other targets it emits
//! nothing of interest.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Entry point to the build script
fn main() {
    arm_targets::process();
    println!("cargo::rerun-if-changed=build.rs");
}

// End of File
