//! Logging macros
//!
//! On bare-metal targets these forward to [`defmt`], so use defmt format
//! strings (`{=usize}` and friends). Everywhere else they expand to nothing,
//! which means host builds don't need a defmt global logger.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        defmt::trace!($($arg)*);
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        defmt::debug!($($arg)*);
    }};
}

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        defmt::info!($($arg)*);
    }};
}

macro_rules! warning {
    ($($arg:tt)*) => {{
        #[cfg(target_os = "none")]
        defmt::warn!($($arg)*);
    }};
}

pub(crate) use {debug, info, trace, warning};

// End of File
