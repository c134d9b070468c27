//! Virtual machine interfaces
//!
//! The generic VM and VCPU object model lives outside the interrupt
//! emulator. This module describes the part of it that emulated devices
//! consume: VCPU lookup, power-on, stage-2 mapping and trapped-region
//! registration.

pub mod hooks;

use crate::config::VmConfig;
use crate::core::irq::VirqOps;
use crate::core::mm::{GuestPhysAddr, MapFlags, VirtAddr};
use crate::emulator::Emulator;
use crate::Result;
use alloc::sync::Arc;

/// VM ID type
pub type VmId = u32;

/// VCPU ID type
pub type VcpuId = u32;

/// MPIDR affinity value of the VCPU with index `cpu`
///
/// Guests see a single cluster, so the index is the Aff0 field.
pub fn cpu_affinity(cpu: usize) -> u64 {
    (cpu as u64) & 0xff
}

/// Operations a virtual machine offers to its emulated devices
pub trait Vm: VirqOps {
    /// VM identifier
    fn id(&self) -> VmId;

    /// VM configuration
    fn config(&self) -> &VmConfig;

    /// Number of VCPUs in the VM
    fn vcpu_count(&self) -> usize {
        self.config().vcpu_count
    }

    /// Look up the VCPU with index `index`
    fn get_vcpu(&self, index: usize) -> Option<VcpuId>;

    /// Power on the VCPU with the given MPIDR affinity at `entry`
    fn vcpu_power_on(&self, affinity: u64, entry: u64, arg: u64) -> Result<()>;

    /// Map `size` bytes of host memory at `host` into the guest at `ipa`
    fn create_guest_mapping(
        &self,
        ipa: GuestPhysAddr,
        host: VirtAddr,
        size: usize,
        flags: MapFlags,
    ) -> Result<()>;

    /// Remove a guest mapping created by [`Vm::create_guest_mapping`]
    fn destroy_guest_mapping(&self, ipa: GuestPhysAddr, size: usize) -> Result<()>;

    /// Route guest accesses to `[base, base + size)` to `device`
    fn register_vdev(&self, base: GuestPhysAddr, size: usize, device: Arc<dyn Emulator>)
        -> Result<()>;

    /// Stop routing accesses at `base`
    fn unregister_vdev(&self, base: GuestPhysAddr) -> Result<()>;
}
