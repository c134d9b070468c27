//! BCM2835 legacy three-bank controller
//!
//! Peripheral interrupts (SPIs) are grouped in three banks of 32. Bank 0 is
//! the "basic" bank, whose pending register also carries shadow bits for a
//! handful of frequently used bank 1/2 interrupts. An interrupt with a
//! shadow bit is only ever reported through that bit, never through its
//! own bank.
//!
//! Whether anything is pending in the legacy controller is summarised in
//! the GPU interrupt bit of core 0's local pending register.

use super::iomem::RegisterFile;
use super::regs::{
    local_irq_pending, LocalIrqPending, BCM2835_IRQ_BASIC_ENABLE, BCM2835_IRQ_BASIC_PENDING,
    BCM2835_IRQ_DISABLE1, BCM2835_IRQ_DISABLE2, BCM2835_IRQ_DISABLE_BASIC, BCM2835_IRQ_ENABLE1,
    BCM2835_IRQ_ENABLE2, BCM2835_IRQ_PENDING1, BCM2835_IRQ_PENDING2, LOCAL_IRQ,
};
use crate::core::irq::{Virq, VirqClass, IRQS_PER_BANK, NR_BANKS, SPI_BASE};
use crate::utils::bit;
use crate::{Error, Result};
use core::ops::RangeInclusive;

/// Bank 0 ids that overlap the shadow bits and cannot be targeted directly
pub const BASIC_SHADOW_IDS: RangeInclusive<u32> = 10..=20;

/// A bank 1/2 interrupt reported through a bank 0 shadow bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedIrqAlias {
    /// Bank of the aliased interrupt (1 or 2)
    pub bank: usize,
    /// Id within that bank
    pub local_id: u32,
    /// Shadow bit in the basic pending register
    pub shadow: u32,
}

const fn alias(bank: usize, local_id: u32, shadow: u32) -> SharedIrqAlias {
    SharedIrqAlias { bank, local_id, shadow }
}

/// Shared interrupt aliases of the basic pending register
pub static SHARED_IRQ_ALIASES: [SharedIrqAlias; 11] = [
    alias(1, 7, 13),
    alias(1, 9, 12),
    alias(1, 10, 11),
    alias(1, 18, 10),
    alias(1, 19, 10),
    alias(2, 21, 19),
    alias(2, 22, 18),
    alias(2, 23, 17),
    alias(2, 24, 16),
    alias(2, 25, 15),
    alias(2, 30, 15),
];

/// Shadow bit for `local_id` of `bank`, if it has one
pub fn shared_alias(bank: usize, local_id: u32) -> Option<u32> {
    SHARED_IRQ_ALIASES
        .iter()
        .find(|a| a.bank == bank && a.local_id == local_id)
        .map(|a| a.shadow)
}

/// Register offsets of the three legacy banks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankLayout {
    /// Pending register of each bank
    pub pending: [usize; NR_BANKS],
    /// Enable register of each bank
    pub enable: [usize; NR_BANKS],
    /// Disable register of each bank
    pub disable: [usize; NR_BANKS],
}

impl BankLayout {
    /// Layout of the BCM2835 ARM interrupt controller
    pub const fn bcm2835() -> Self {
        Self {
            pending: [
                BCM2835_IRQ_BASIC_PENDING,
                BCM2835_IRQ_PENDING1,
                BCM2835_IRQ_PENDING2,
            ],
            enable: [
                BCM2835_IRQ_BASIC_ENABLE,
                BCM2835_IRQ_ENABLE1,
                BCM2835_IRQ_ENABLE2,
            ],
            disable: [
                BCM2835_IRQ_DISABLE_BASIC,
                BCM2835_IRQ_DISABLE1,
                BCM2835_IRQ_DISABLE2,
            ],
        }
    }

    /// First virq of `bank`
    pub const fn virq_base(bank: usize) -> Virq {
        SPI_BASE + bank as u32 * IRQS_PER_BANK
    }

    /// Find the pending register offset and bit that report `virq`
    pub fn locate(&self, virq: Virq) -> Result<(usize, u32)> {
        let (bank, local_id) = match VirqClass::classify(virq) {
            Ok(VirqClass::Spi { bank, local_id }) => (bank, local_id),
            _ => {
                log::warn!("bcm2835: virq {} is not a peripheral interrupt", virq);
                return Err(Error::InvalidArgument);
            }
        };

        if bank == 0 && BASIC_SHADOW_IDS.contains(&local_id) {
            log::warn!("bcm2835: virq {} overlaps a basic shadow bit", virq);
            return Err(Error::InvalidArgument);
        }

        match shared_alias(bank, local_id) {
            Some(shadow) => Ok((self.pending[0], shadow)),
            None => Ok((self.pending[bank], local_id)),
        }
    }

    /// Whether any legacy pending register is non-zero
    pub fn any_pending(&self, regs: &RegisterFile) -> Result<bool> {
        for offset in self.pending {
            if regs.read_u32(offset)? != 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Mark `virq` pending and raise the GPU summary bit
    pub fn inject(&self, regs: &mut RegisterFile, virq: Virq) -> Result<()> {
        let (offset, id) = self.locate(virq)?;
        regs.set_bits(offset, bit(id))?;
        Self::set_summary(regs, true)
    }

    /// Clear `virq`, dropping the GPU summary bit once nothing is pending
    pub fn acknowledge(&self, regs: &mut RegisterFile, virq: Virq) -> Result<()> {
        let (offset, id) = self.locate(virq)?;
        regs.clear_bits(offset, bit(id))?;
        if self.any_pending(regs)? {
            return Ok(());
        }
        Self::set_summary(regs, false)
    }

    // The legacy controller raises the GPU interrupt of core 0
    fn set_summary(regs: &mut RegisterFile, pending: bool) -> Result<()> {
        let offset = local_irq_pending(0);
        let mut local = LocalIrqPending::new(regs.read_u32(offset)?);
        local.modify(if pending {
            LOCAL_IRQ::GPU_FAST::SET
        } else {
            LOCAL_IRQ::GPU_FAST::CLEAR
        });
        regs.write_u32(offset, local.get())
    }

    /// Map an enable/disable register offset to (bank, is_enable)
    pub fn enable_register(&self, offset: usize) -> Option<(usize, bool)> {
        (0..NR_BANKS).find_map(|bank| {
            if self.enable[bank] == offset {
                Some((bank, true))
            } else if self.disable[bank] == offset {
                Some((bank, false))
            } else {
                None
            }
        })
    }

    /// Apply an enable or disable write to `bank`
    ///
    /// Both registers of the bank read back the resulting enable mask.
    pub fn update_enable(
        &self,
        regs: &mut RegisterFile,
        bank: usize,
        mask: u32,
        enable: bool,
    ) -> Result<u32> {
        if bank >= NR_BANKS {
            return Err(Error::InvalidArgument);
        }

        let current = regs.read_u32(self.enable[bank])?;
        let updated = if enable { current | mask } else { current & !mask };
        regs.write_u32(self.enable[bank], updated)?;
        regs.write_u32(self.disable[bank], updated)?;
        Ok(updated)
    }
}

impl Default for BankLayout {
    fn default() -> Self {
        Self::bcm2835()
    }
}
