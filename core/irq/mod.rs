//! Virtual interrupt layer interfaces
//!
//! This module defines the abstract virq numbering shared by every
//! interrupt controller model, the generic virq operations the emulators
//! call back into, and the per-VM controller selection.

use crate::core::vmm::VcpuId;
use crate::emulator::bcm2836::Bcm2836Virq;
use crate::{Error, Result};
use alloc::sync::Arc;
use core::ops::Range;

/// Virtual interrupt number type
pub type Virq = u32;

/// Software generated interrupts
pub const SGI_RANGE: Range<Virq> = 0..16;

/// Private peripheral interrupts (including the four virtual timers)
pub const PPI_RANGE: Range<Virq> = 16..32;

/// Shared peripheral interrupts, routed through the legacy banks
pub const SPI_RANGE: Range<Virq> = 32..128;

/// First virq of the PPI range
pub const PPI_BASE: Virq = PPI_RANGE.start;

/// First virq of the SPI range
pub const SPI_BASE: Virq = SPI_RANGE.start;

/// Number of interrupts per legacy bank
pub const IRQS_PER_BANK: u32 = 32;

/// Number of legacy banks
pub const NR_BANKS: usize = 3;

/// Classification of a virq by the sub-model that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirqClass {
    /// Inter-core software interrupt
    Sgi(u32),
    /// Per-core private interrupt, as an offset from [`PPI_BASE`]
    Ppi(u32),
    /// Shared peripheral interrupt in a legacy bank
    Spi {
        /// Bank number (0..NR_BANKS)
        bank: usize,
        /// Bit within the bank
        local_id: u32,
    },
}

impl VirqClass {
    /// Classify `virq` purely by numeric range
    pub fn classify(virq: Virq) -> Result<Self> {
        if SGI_RANGE.contains(&virq) {
            Ok(VirqClass::Sgi(virq))
        } else if PPI_RANGE.contains(&virq) {
            Ok(VirqClass::Ppi(virq - PPI_BASE))
        } else if SPI_RANGE.contains(&virq) {
            let hwirq = virq - SPI_BASE;
            Ok(VirqClass::Spi {
                bank: (hwirq / IRQS_PER_BANK) as usize,
                local_id: hwirq % IRQS_PER_BANK,
            })
        } else {
            Err(Error::InvalidArgument)
        }
    }
}

/// Generic virq operations provided by the hypervisor's interrupt layer
pub trait VirqOps: Send + Sync {
    /// Enable delivery of `virq` on `vcpu`
    fn virq_enable(&self, vcpu: VcpuId, virq: Virq);

    /// Disable delivery of `virq` on `vcpu`
    fn virq_disable(&self, vcpu: VcpuId, virq: Virq);

    /// Drop any pending state the generic layer holds for `virq` on `vcpu`
    fn clear_pending_virq(&self, vcpu: VcpuId, virq: Virq);

    /// Raise `virq` on `target`, possibly from another physical CPU
    fn send_virq_to_vcpu(&self, target: VcpuId, virq: Virq) -> Result<()>;
}

/// An interrupt controller model that accepts virq injections
pub trait VirqChip: Send + Sync {
    /// Name of the controller model
    fn name(&self) -> &str;

    /// Reflect `virq` into the controller state seen by `vcpu`
    fn send_virq(&self, vcpu: VcpuId, virq: Virq) -> Result<()>;
}

/// Interrupt controller instance attached to a VM
#[derive(Clone)]
pub enum VirqController {
    /// Emulated BCM2836 local + BCM2835 legacy controller
    Bcm2836(Arc<Bcm2836Virq>),
    /// Controller provided by a pass-through model (virtual GIC)
    PassThrough(Arc<dyn VirqChip>),
}

impl VirqController {
    /// Inject `virq` into the VM's controller
    pub fn send_virq(&self, vcpu: VcpuId, virq: Virq) -> Result<()> {
        match self {
            VirqController::Bcm2836(dev) => dev.send_virq(vcpu, virq),
            VirqController::PassThrough(chip) => chip.send_virq(vcpu, virq),
        }
    }

    /// Name of the controller model
    pub fn name(&self) -> &str {
        match self {
            VirqController::Bcm2836(dev) => dev.name(),
            VirqController::PassThrough(chip) => chip.name(),
        }
    }

    /// The emulated BCM2836 controller, if this VM uses it
    pub fn as_bcm2836(&self) -> Option<&Arc<Bcm2836Virq>> {
        match self {
            VirqController::Bcm2836(dev) => Some(dev),
            VirqController::PassThrough(_) => None,
        }
    }
}

impl core::fmt::Debug for VirqController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("VirqController").field(&self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, VirqClass::Sgi(0) ; "first sgi")]
    #[test_case(15, VirqClass::Sgi(15) ; "last sgi")]
    #[test_case(16, VirqClass::Ppi(0) ; "first ppi")]
    #[test_case(27, VirqClass::Ppi(11) ; "local timer ppi")]
    #[test_case(31, VirqClass::Ppi(15) ; "last ppi")]
    #[test_case(32, VirqClass::Spi { bank: 0, local_id: 0 } ; "first spi")]
    #[test_case(39, VirqClass::Spi { bank: 0, local_id: 7 } ; "bank 0 id 7")]
    #[test_case(71, VirqClass::Spi { bank: 1, local_id: 7 } ; "bank 1 id 7")]
    #[test_case(117, VirqClass::Spi { bank: 2, local_id: 21 } ; "bank 2 id 21")]
    #[test_case(127, VirqClass::Spi { bank: 2, local_id: 31 } ; "last spi")]
    fn test_classify(virq: Virq, expected: VirqClass) {
        assert_eq!(VirqClass::classify(virq), Ok(expected));
    }

    #[test_case(128 ; "one past the end")]
    #[test_case(1020 ; "spurious")]
    #[test_case(u32::MAX ; "max")]
    fn test_classify_out_of_range(virq: Virq) {
        assert_eq!(VirqClass::classify(virq), Err(Error::InvalidArgument));
    }

    struct NullChip;

    impl VirqChip for NullChip {
        fn name(&self) -> &str {
            "null"
        }

        fn send_virq(&self, _vcpu: VcpuId, virq: Virq) -> Result<()> {
            if virq < 1020 {
                Ok(())
            } else {
                Err(Error::InvalidArgument)
            }
        }
    }

    #[test]
    fn test_pass_through_controller() {
        let controller = VirqController::PassThrough(Arc::new(NullChip));
        assert_eq!(controller.name(), "null");
        assert!(controller.as_bcm2836().is_none());
        assert!(controller.send_virq(0, 40).is_ok());
        assert_eq!(controller.send_virq(0, 1023), Err(Error::InvalidArgument));
    }
}
