//! Utility functions and data structures
//!
//! This module contains small helpers used throughout the emulator.

pub mod bitmap;

// Re-export commonly used utilities
pub use self::bitmap::{bit, for_each_set_bit, lowest_set_bit, SetBits};

/// Whether `addr` is a multiple of `align`
#[macro_export]
macro_rules! is_aligned {
    ($addr:expr, $align:expr) => {
        $addr % $align == 0
    };
}
