//! Configuration management
//!
//! This module holds the per-VM settings the interrupt layer consults when
//! a virtual machine is created.

use crate::{Error, Result};
use alloc::string::String;

/// Maximum number of VCPUs per VM
pub const MAX_VCPUS_PER_VM: usize = 8;

/// Maximum number of VCPUs the BCM2836 local controller can describe
pub const BCM2836_MAX_VCPUS: usize = 4;

/// Interrupt controller model presented to a guest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqModel {
    /// Emulated BCM2836 local + BCM2835 legacy controller (native guests)
    Bcm2836,
    /// Pass-through virtual GICv2
    Vgicv2,
}

impl IrqModel {
    /// Whether the VM runs as a native Raspberry Pi guest
    pub fn is_native(self) -> bool {
        matches!(self, IrqModel::Bcm2836)
    }
}

impl Default for IrqModel {
    fn default() -> Self {
        IrqModel::Vgicv2
    }
}

/// VM configuration structure
#[derive(Debug, Clone)]
pub struct VmConfig {
    /// VM name
    pub name: String,
    /// Number of VCPUs
    pub vcpu_count: usize,
    /// Interrupt controller model
    pub irq_model: IrqModel,
}

impl VmConfig {
    /// Create a configuration for a native guest using the emulated BCM2836 controller
    pub fn native(name: &str, vcpu_count: usize) -> Self {
        Self {
            name: String::from(name),
            vcpu_count,
            irq_model: IrqModel::Bcm2836,
        }
    }

    /// Create a configuration for a guest using the virtual GIC
    pub fn vgic(name: &str, vcpu_count: usize) -> Self {
        Self {
            name: String::from(name),
            vcpu_count,
            irq_model: IrqModel::Vgicv2,
        }
    }
}

/// Validate VM configuration
pub fn validate_vm_config(config: &VmConfig) -> Result<()> {
    if config.name.is_empty() {
        return Err(Error::InvalidArgument);
    }

    if config.vcpu_count == 0 || config.vcpu_count > MAX_VCPUS_PER_VM {
        return Err(Error::InvalidArgument);
    }

    // The local controller only has per-core registers for four cores
    if config.irq_model == IrqModel::Bcm2836 && config.vcpu_count > BCM2836_MAX_VCPUS {
        return Err(Error::InvalidArgument);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(VmConfig::native("rpi", 1) ; "native single core")]
    #[test_case(VmConfig::native("rpi", 4) ; "native four cores")]
    #[test_case(VmConfig::vgic("linux", 8) ; "vgic eight cores")]
    fn test_valid_configs(config: VmConfig) {
        assert_eq!(validate_vm_config(&config), Ok(()));
    }

    #[test_case(VmConfig::native("", 1) ; "empty name")]
    #[test_case(VmConfig::native("rpi", 0) ; "no vcpus")]
    #[test_case(VmConfig::native("rpi", 5) ; "native too many vcpus")]
    #[test_case(VmConfig::vgic("linux", 9) ; "vgic too many vcpus")]
    fn test_invalid_configs(config: VmConfig) {
        assert_eq!(validate_vm_config(&config), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_irq_model_native() {
        assert!(IrqModel::Bcm2836.is_native());
        assert!(!IrqModel::Vgicv2.is_native());
        assert_eq!(IrqModel::default(), IrqModel::Vgicv2);
    }
}
