//! Bcmvisor - BCM2836 interrupt virtualization for a Rust type-1 hypervisor
//!
//! This library provides the emulated Raspberry Pi 2/3 interrupt controller
//! that the hypervisor presents to a native guest: the per-core BCM2836
//! local controller, the legacy three-bank BCM2835 peripheral controller,
//! and the virq routing that feeds both from the generic interrupt layer.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

// Core modules
#[macro_use]
pub mod utils;
pub mod config;

// Core hypervisor interfaces
pub mod core;

// Device emulators
pub mod emulator;

// Re-export key types for convenience
pub use crate::config::{IrqModel, VmConfig};
pub use crate::core::irq::{VirqClass, VirqController, VirqOps};
pub use crate::core::vmm::hooks::{VmCreateHook, VmHooks};
pub use crate::core::vmm::{VcpuId, Vm, VmId};
pub use crate::emulator::bcm2836::{Bcm2836Virq, Bcm2836VirqHook};
pub use crate::emulator::Emulator;

/// Common error type for Bcmvisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid argument
    InvalidArgument,
    /// Out of memory
    OutOfMemory,
    /// Not found
    NotFound,
    /// Resource unavailable
    ResourceUnavailable,
    /// Invalid state
    InvalidState,
    /// Emulator error
    Emulator(emulator::Error),
}

impl From<emulator::Error> for Error {
    fn from(err: emulator::Error) -> Self {
        Error::Emulator(err)
    }
}

impl ::core::fmt::Display for Error {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::OutOfMemory => f.write_str("out of memory"),
            Error::NotFound => f.write_str("not found"),
            Error::ResourceUnavailable => f.write_str("resource unavailable"),
            Error::InvalidState => f.write_str("invalid state"),
            Error::Emulator(err) => write!(f, "emulator error: {:?}", err),
        }
    }
}

/// Result type alias
pub type Result<T> = ::core::result::Result<T, Error>;
