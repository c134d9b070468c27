//! BCM2836 per-core local interrupt controller
//!
//! Every core has a timer interrupt control register, four mailboxes and
//! a local pending register. Mailbox 0 is used to carry virtual SGIs: an
//! SGI delivered to a core sets the SGI's bit in the core's mailbox 0
//! read/clear register, and the matching mailbox bit of the local pending
//! register stays set as long as any bit of that mailbox is set.
//!
//! All helpers here only touch the register file. Calls into the VM are
//! made by the controller.

use super::iomem::RegisterFile;
use super::regs::{
    local_irq_pending, local_mailbox_clr, local_timer_int_control, release_slot,
    LocalIrqPending, LOCAL_IRQ, LOCAL_IRQ_MAILBOXES, NR_LOCAL_CPUS, NR_MAILBOXES,
};
use crate::core::irq::{Virq, PPI_RANGE, SGI_RANGE};
use crate::utils::{bit, lowest_set_bit};
use crate::{Error, Result};
use tock_registers::fields::FieldValue;

/// Number of local interrupt ids addressable as PPIs
const NR_LOCAL_IRQS: u32 = PPI_RANGE.end - PPI_RANGE.start;

/// Local controller state shared by all cores of one VM
#[derive(Debug, Clone, Copy)]
pub struct LocalIntc {
    /// Number of cores backed by a VCPU
    nr_cpus: usize,
}

impl LocalIntc {
    /// Create the local controller for `nr_cpus` cores
    pub fn new(nr_cpus: usize) -> Result<Self> {
        if nr_cpus == 0 || nr_cpus > NR_LOCAL_CPUS {
            return Err(Error::InvalidArgument);
        }
        Ok(Self { nr_cpus })
    }

    /// Number of cores
    pub fn nr_cpus(&self) -> usize {
        self.nr_cpus
    }

    /// Check that `core` is backed by a VCPU
    pub fn check_core(&self, core: usize) -> Result<()> {
        if core >= self.nr_cpus {
            log::warn!("bcm2836: core {} out of range (nr_cpus {})", core, self.nr_cpus);
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Decode the SGI carried by a mailbox write mask
    ///
    /// Only the lowest set bit is considered.
    pub fn sgi_from_mask(mask: u32) -> Result<Virq> {
        match lowest_set_bit(mask) {
            Some(sgi) if SGI_RANGE.contains(&sgi) => Ok(sgi),
            _ => {
                log::warn!("bcm2836: mailbox mask {:#x} carries no SGI", mask);
                Err(Error::InvalidArgument)
            }
        }
    }

    /// Store the timer interrupt control of `core`
    pub fn set_timer_mask(&self, regs: &mut RegisterFile, core: usize, mask: u32) -> Result<()> {
        self.check_core(core)?;
        regs.write_u32(local_timer_int_control(core), mask)
    }

    /// Mark `sgi` pending in mailbox 0 of `core`
    pub fn inject_sgi(&self, regs: &mut RegisterFile, core: usize, sgi: Virq) -> Result<()> {
        self.check_core(core)?;
        if !SGI_RANGE.contains(&sgi) {
            return Err(Error::InvalidArgument);
        }

        regs.set_bits(local_mailbox_clr(core, 0), bit(sgi))?;
        Self::modify_pending(regs, core, LOCAL_IRQ::MAILBOX0::SET)
    }

    /// Clear `sgi` from `mailbox` of `core`
    ///
    /// The mailbox bit of the local pending register is dropped once the
    /// mailbox is empty.
    pub fn clear_sgi(
        &self,
        regs: &mut RegisterFile,
        core: usize,
        mailbox: usize,
        sgi: Virq,
    ) -> Result<()> {
        self.check_core(core)?;
        if mailbox >= NR_MAILBOXES || !SGI_RANGE.contains(&sgi) {
            return Err(Error::InvalidArgument);
        }

        let remaining = regs.clear_bits(local_mailbox_clr(core, mailbox), bit(sgi))?;
        if remaining == 0 {
            Self::modify_pending(regs, core, LOCAL_IRQ_MAILBOXES[mailbox].val(0))?;
        }
        Ok(())
    }

    /// Mark PPI `ppi` pending in the local pending register of `core`
    pub fn inject_ppi(&self, regs: &mut RegisterFile, core: usize, ppi: Virq) -> Result<()> {
        self.check_core(core)?;
        if !PPI_RANGE.contains(&ppi) {
            return Err(Error::InvalidArgument);
        }

        let id = ppi - PPI_RANGE.start;
        if Self::is_reserved(id) {
            log::warn!("bcm2836: PPI {} is owned by another source", ppi);
            return Err(Error::InvalidArgument);
        }

        regs.set_bits(local_irq_pending(core), bit(id))?;
        Ok(())
    }

    /// Clear local interrupt `id` of `core`
    ///
    /// Accepts every id [`LocalIntc::inject_ppi`] can set, so each injected
    /// PPI can be acknowledged.
    pub fn clear_ppi(&self, regs: &mut RegisterFile, core: usize, id: u32) -> Result<()> {
        self.check_core(core)?;
        if id >= NR_LOCAL_IRQS || Self::is_reserved(id) {
            log::warn!("bcm2836: cannot acknowledge local irq {}", id);
            return Err(Error::InvalidArgument);
        }

        regs.clear_bits(local_irq_pending(core), bit(id))?;
        Ok(())
    }

    /// Record the spin table release address of `core`
    pub fn store_release(&self, regs: &mut RegisterFile, core: usize, entry: u64) -> Result<()> {
        self.check_core(core)?;
        regs.write_u64(release_slot(core), entry)
    }

    fn modify_pending(
        regs: &mut RegisterFile,
        core: usize,
        field: FieldValue<u32, LOCAL_IRQ::Register>,
    ) -> Result<()> {
        let offset = local_irq_pending(core);
        let mut pending = LocalIrqPending::new(regs.read_u32(offset)?);
        pending.modify(field);
        regs.write_u32(offset, pending.get())
    }

    // Mailbox bits are derived from the mailboxes, the GPU bit from the legacy banks
    fn is_reserved(id: u32) -> bool {
        let shift = id as usize;
        LOCAL_IRQ_MAILBOXES.iter().any(|field| field.shift == shift)
            || LOCAL_IRQ::GPU_FAST.shift == shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mm::IoPage;
    use crate::emulator::bcm2836::regs::local_irq_mask;
    use test_case::test_case;

    const MAILBOX0: u32 = local_irq_mask(LOCAL_IRQ::MAILBOX0);

    fn setup(nr_cpus: usize) -> (LocalIntc, RegisterFile) {
        (
            LocalIntc::new(nr_cpus).unwrap(),
            RegisterFile::new(IoPage::try_new().unwrap()),
        )
    }

    #[test_case(0 ; "no cores")]
    #[test_case(5 ; "too many cores")]
    fn test_new_rejects(nr_cpus: usize) {
        assert!(LocalIntc::new(nr_cpus).is_err());
    }

    #[test_case(1, Ok(0) ; "sgi 0")]
    #[test_case(1 << 5, Ok(5) ; "sgi 5")]
    #[test_case(0b1010_0000, Ok(5) ; "lowest bit wins")]
    #[test_case(1 << 15, Ok(15) ; "sgi 15")]
    #[test_case(0, Err(Error::InvalidArgument) ; "empty mask")]
    #[test_case(1 << 16, Err(Error::InvalidArgument) ; "not an sgi")]
    fn test_sgi_from_mask(mask: u32, expected: Result<Virq>) {
        assert_eq!(LocalIntc::sgi_from_mask(mask), expected);
    }

    #[test]
    fn test_sgi_inject_and_clear() {
        let (local, mut regs) = setup(4);

        local.inject_sgi(&mut regs, 2, 5).unwrap();
        local.inject_sgi(&mut regs, 2, 7).unwrap();
        assert_eq!(regs.read_u32(local_mailbox_clr(2, 0)).unwrap(), bit(5) | bit(7));
        assert_eq!(regs.read_u32(local_irq_pending(2)).unwrap(), MAILBOX0);

        local.clear_sgi(&mut regs, 2, 0, 5).unwrap();
        assert_eq!(regs.read_u32(local_irq_pending(2)).unwrap(), MAILBOX0);

        local.clear_sgi(&mut regs, 2, 0, 7).unwrap();
        assert_eq!(regs.read_u32(local_mailbox_clr(2, 0)).unwrap(), 0);
        assert_eq!(regs.read_u32(local_irq_pending(2)).unwrap(), 0);
    }

    #[test]
    fn test_sgi_rejects_bad_core() {
        let (local, mut regs) = setup(2);
        assert_eq!(local.inject_sgi(&mut regs, 2, 1), Err(Error::InvalidArgument));
        assert_eq!(local.clear_sgi(&mut regs, 3, 0, 1), Err(Error::InvalidArgument));
        assert_eq!(local.clear_sgi(&mut regs, 0, 4, 1), Err(Error::InvalidArgument));
        assert_eq!(regs.read_u32(local_mailbox_clr(2, 0)).unwrap(), 0);
    }

    #[test_case(16, 0 ; "secure physical timer")]
    #[test_case(19, 3 ; "virtual timer")]
    #[test_case(25, 9 ; "pmu")]
    #[test_case(27, 11 ; "local timer")]
    fn test_inject_ppi(ppi: Virq, id: u32) {
        let (local, mut regs) = setup(1);
        local.inject_ppi(&mut regs, 0, ppi).unwrap();
        assert_eq!(regs.read_u32(local_irq_pending(0)).unwrap(), bit(id));
    }

    #[test_case(20 ; "mailbox 0")]
    #[test_case(23 ; "mailbox 3")]
    #[test_case(24 ; "gpu")]
    #[test_case(15 ; "sgi")]
    #[test_case(32 ; "spi")]
    fn test_inject_ppi_refused(ppi: Virq) {
        let (local, mut regs) = setup(1);
        assert_eq!(local.inject_ppi(&mut regs, 0, ppi), Err(Error::InvalidArgument));
        assert_eq!(regs.read_u32(local_irq_pending(0)).unwrap(), 0);
    }

    #[test]
    fn test_clear_ppi() {
        let (local, mut regs) = setup(2);
        local.inject_ppi(&mut regs, 1, 19).unwrap();
        local.inject_ppi(&mut regs, 1, 25).unwrap();

        local.clear_ppi(&mut regs, 1, 3).unwrap();
        assert_eq!(
            regs.read_u32(local_irq_pending(1)).unwrap(),
            local_irq_mask(LOCAL_IRQ::PMU_FAST)
        );
    }

    #[test_case(0 ; "secure physical timer")]
    #[test_case(9 ; "pmu")]
    #[test_case(10 ; "axi")]
    #[test_case(11 ; "local timer")]
    #[test_case(15 ; "last ppi")]
    fn test_every_injectable_ppi_clears(id: u32) {
        let (local, mut regs) = setup(1);
        local.inject_ppi(&mut regs, 0, PPI_RANGE.start + id).unwrap();
        local.clear_ppi(&mut regs, 0, id).unwrap();
        assert_eq!(regs.read_u32(local_irq_pending(0)).unwrap(), 0);
    }

    #[test_case(4 ; "mailbox 0")]
    #[test_case(7 ; "mailbox 3")]
    #[test_case(8 ; "gpu")]
    #[test_case(16 ; "past the ppi range")]
    fn test_clear_ppi_refused(id: u32) {
        let (local, mut regs) = setup(1);
        local.inject_sgi(&mut regs, 0, 1).unwrap();
        let before = regs.read_u32(local_irq_pending(0)).unwrap();

        assert_eq!(local.clear_ppi(&mut regs, 0, id), Err(Error::InvalidArgument));
        assert_eq!(regs.read_u32(local_irq_pending(0)).unwrap(), before);
    }

    #[test]
    fn test_timer_mask_and_release() {
        let (local, mut regs) = setup(4);
        local.set_timer_mask(&mut regs, 3, 0xa5).unwrap();
        assert_eq!(regs.read_u32(local_timer_int_control(3)).unwrap(), 0xa5);

        local.store_release(&mut regs, 1, 0x8000).unwrap();
        assert_eq!(regs.read_u64(release_slot(1)).unwrap(), 0x8000);
        assert!(local.store_release(&mut regs, 4, 0x8000).is_err());
    }
}
