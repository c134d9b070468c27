//! Device emulator module
//!
//! Provides the capability set every emulated device exposes to the
//! trapped-access dispatch code, and the emulated devices themselves.

pub mod bcm2836;

#[cfg(test)]
pub(crate) mod testing;

use crate::core::vmm::VcpuId;

/// Emulator error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid register access (size, alignment or range)
    InvalidAccess,
}

/// An emulated device reachable through trapped guest accesses
///
/// `address` arguments are guest physical addresses inside the region the
/// device was registered for. `vcpu` is the VCPU whose access trapped.
pub trait Emulator: Send + Sync {
    /// Name of the emulated device
    fn name(&self) -> &str;

    /// Handle a trapped guest read
    fn read(&self, vcpu: VcpuId, address: u64, size: u32) -> crate::Result<u64>;

    /// Handle a trapped guest write
    fn write(&self, vcpu: VcpuId, address: u64, value: u64, size: u32) -> crate::Result<()>;

    /// Return the device to its power-on state
    fn reset(&self);

    /// Detach the device from its VM before it is dropped
    fn teardown(&self);
}
