//! Synchronization primitives
//!
//! This module provides synchronization primitives suitable for
//! use in interrupt context inside the hypervisor.

pub mod spinlock;

// Re-export SpinLock for convenience
pub use spinlock::{SpinLock, SpinLockGuard};
