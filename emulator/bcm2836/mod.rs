//! BCM2836 virtual interrupt controller
//!
//! Emulates the Raspberry Pi 2/3 two-tier interrupt controller for native
//! guests: the per-core BCM2836 local controller and the BCM2835 legacy
//! peripheral controller, sharing one register page.
//!
//! The page is mapped read-only into the guest, so guest reads are served
//! by the page itself and only writes trap into [`Emulator::write`].
//! Interrupt injection comes in through [`Bcm2836Virq::send_virq`], possibly
//! from another physical CPU. Both paths serialize on one controller lock.
//! Enable state handed to the VM is updated under that lock, so it always
//! matches the register readback. Delivery, power-on and pending-state
//! clears are issued after the lock is dropped, since delivery may come
//! straight back into [`Bcm2836Virq::send_virq`].
//!
//! ```text
//! virq   0..16   SGI  -> mailbox 0 of the target core
//! virq  16..32   PPI  -> local pending register of the target core
//! virq  32..128  SPI  -> legacy banks (basic, 1, 2)
//! ```

pub mod bank;
pub mod hook;
pub mod iomem;
pub mod local;
pub mod regs;

pub use bank::BankLayout;
pub use hook::Bcm2836VirqHook;

use self::iomem::RegisterFile;
use self::local::LocalIntc;
use self::regs::*;
use crate::core::irq::{Virq, VirqChip, VirqClass, PPI_BASE, SPI_BASE, SPI_RANGE};
use crate::core::mm::{GuestPhysAddr, IoPage, VirtAddr, PAGE_SIZE};
use crate::core::sync::SpinLock;
use crate::core::vmm::{cpu_affinity, VcpuId, Vm};
use crate::emulator::{Emulator, Error as EmulatorError};
use crate::utils::for_each_set_bit;
use crate::{Error, Result};
use alloc::sync::{Arc, Weak};

/// Name of the emulated device
pub const BCM2836_VIRQ_NAME: &str = "bcm2836-irq";

/// Virtual BCM2836 interrupt controller of one VM
pub struct Bcm2836Virq {
    /// Owning VM
    vm: Weak<dyn Vm>,
    /// Guest physical base of the register page
    base: GuestPhysAddr,
    /// Per-core controller
    local: LocalIntc,
    /// Legacy bank offsets
    banks: BankLayout,
    /// Register page shared with the guest
    regs: SpinLock<RegisterFile>,
}

impl Bcm2836Virq {
    /// Create the controller of `vm` on top of `page`
    ///
    /// The page is used as-is; call [`Bcm2836Virq::reset`] to zero it.
    pub fn new(vm: &Arc<dyn Vm>, page: IoPage, banks: BankLayout) -> Result<Self> {
        Ok(Self {
            vm: Arc::downgrade(vm),
            base: BCM2836_INC_BASE,
            local: LocalIntc::new(vm.vcpu_count())?,
            banks,
            regs: SpinLock::new(RegisterFile::new(page)),
        })
    }

    /// Name of the emulated device
    pub fn name(&self) -> &str {
        BCM2836_VIRQ_NAME
    }

    /// Guest physical base of the register page
    pub fn base(&self) -> GuestPhysAddr {
        self.base
    }

    /// Host address of the register page
    pub fn host_addr(&self) -> VirtAddr {
        self.regs.lock().host_addr()
    }

    /// Number of cores backed by a VCPU
    pub fn nr_cpus(&self) -> usize {
        self.local.nr_cpus()
    }

    fn vm(&self) -> Result<Arc<dyn Vm>> {
        self.vm.upgrade().ok_or(Error::NotFound)
    }

    fn target_vcpu(&self, vm: &Arc<dyn Vm>, core: usize) -> Result<VcpuId> {
        self.local.check_core(core)?;
        vm.get_vcpu(core).ok_or_else(|| {
            log::warn!("bcm2836: no VCPU for core {}", core);
            Error::NotFound
        })
    }

    /// Zero every register
    pub fn reset(&self) {
        self.regs.lock().reset();
    }

    /// Reflect `virq` into the controller state seen by `vcpu`
    pub fn send_virq(&self, vcpu: VcpuId, virq: Virq) -> Result<()> {
        let class = VirqClass::classify(virq).map_err(|err| {
            log::error!("bcm2836: unsupported virq {} for VCPU {}", virq, vcpu);
            err
        })?;

        match class {
            VirqClass::Sgi(sgi) => self.inject_sgi(vcpu as usize, sgi),
            VirqClass::Ppi(_) => self.inject_ppi(vcpu as usize, virq),
            VirqClass::Spi { .. } => self.inject_spi(virq),
        }
    }

    /// Mark SGI `sgi` pending on `core`
    pub fn inject_sgi(&self, core: usize, sgi: Virq) -> Result<()> {
        let mut regs = self.regs.lock();
        self.local.inject_sgi(&mut regs, core, sgi)
    }

    /// Mark PPI `ppi` pending on `core`
    pub fn inject_ppi(&self, core: usize, ppi: Virq) -> Result<()> {
        let mut regs = self.regs.lock();
        self.local.inject_ppi(&mut regs, core, ppi)
    }

    /// Mark SPI `virq` pending in the legacy banks
    pub fn inject_spi(&self, virq: Virq) -> Result<()> {
        let mut regs = self.regs.lock();
        self.banks.inject(&mut regs, virq)
    }

    /// Acknowledge SPI `virq` on behalf of `vcpu`
    pub fn acknowledge_spi(&self, vcpu: VcpuId, virq: Virq) -> Result<()> {
        let vm = self.vm()?;
        {
            let mut regs = self.regs.lock();
            self.banks.acknowledge(&mut regs, virq)?;
        }
        vm.clear_pending_virq(vcpu, virq);
        Ok(())
    }

    /// Acknowledge local interrupt `id` of the writing VCPU
    pub fn acknowledge_local(&self, vcpu: VcpuId, id: u32) -> Result<()> {
        let vm = self.vm()?;
        {
            let mut regs = self.regs.lock();
            self.local.clear_ppi(&mut regs, vcpu as usize, id)?;
        }
        vm.clear_pending_virq(vcpu, id + PPI_BASE);
        Ok(())
    }

    /// Program the timer interrupt control of `core`
    ///
    /// Each of the four timer sources enables or disables its PPI on the
    /// target core.
    pub fn set_timer_mask(&self, core: usize, mask: u32) -> Result<()> {
        let vm = self.vm()?;
        let target = self.target_vcpu(&vm, core)?;

        let mut regs = self.regs.lock();
        self.local.set_timer_mask(&mut regs, core, mask)?;

        let control = TimerIntControl::new(mask);
        for (ppi, source) in (PPI_BASE..).zip(TIMER_IRQ_SOURCES) {
            if control.is_set(source) {
                vm.virq_enable(target, ppi);
            } else {
                vm.virq_disable(target, ppi);
            }
        }
        Ok(())
    }

    /// Deliver the SGI carried by `mask` to `core`
    pub fn send_sgi(&self, core: usize, mask: u32) -> Result<()> {
        let vm = self.vm()?;
        let sgi = LocalIntc::sgi_from_mask(mask)?;
        let target = self.target_vcpu(&vm, core)?;

        log::debug!("bcm2836: SGI {} -> core {}", sgi, core);
        vm.send_virq_to_vcpu(target, sgi)
    }

    /// Clear the SGI carried by `mask` from `mailbox` of `core`
    pub fn clear_sgi(&self, vcpu: VcpuId, core: usize, mailbox: usize, mask: u32) -> Result<()> {
        let vm = self.vm()?;
        let sgi = LocalIntc::sgi_from_mask(mask)?;
        self.target_vcpu(&vm, core)?;
        {
            let mut regs = self.regs.lock();
            self.local.clear_sgi(&mut regs, core, mailbox, sgi)?;
        }

        log::debug!("bcm2836: clear SGI {} on core {} mailbox {}", sgi, core, mailbox);
        vm.clear_pending_virq(vcpu, sgi);
        Ok(())
    }

    /// Release `core` from the spin table at `entry`
    pub fn release_cpu(&self, core: usize, entry: u64) -> Result<()> {
        let vm = self.vm()?;
        {
            let mut regs = self.regs.lock();
            self.local.store_release(&mut regs, core, entry)?;
        }

        log::debug!("bcm2836: power on core {} at {:#x}", core, entry);
        vm.vcpu_power_on(cpu_affinity(core), entry, 0)
    }

    /// Apply an enable/disable write to `bank` on behalf of `vcpu`
    pub fn update_enable(&self, vcpu: VcpuId, bank: usize, mask: u32, enable: bool) -> Result<()> {
        let vm = self.vm()?;
        let mut regs = self.regs.lock();
        self.banks.update_enable(&mut regs, bank, mask, enable)?;

        let base = BankLayout::virq_base(bank);
        for id in for_each_set_bit(mask) {
            if enable {
                vm.virq_enable(vcpu, base + id);
            } else {
                vm.virq_disable(vcpu, base + id);
            }
        }
        Ok(())
    }

    /// Read a 32-bit register at page offset `offset`
    pub fn read_reg(&self, offset: usize) -> Result<u32> {
        self.regs.lock().read_u32(offset)
    }

    /// Local pending register of `core`
    pub fn local_pending(&self, core: usize) -> Result<u32> {
        self.local.check_core(core)?;
        self.read_reg(local_irq_pending(core))
    }

    /// Pending register of legacy `bank`
    pub fn bank_pending(&self, bank: usize) -> Result<u32> {
        let offset = *self.banks.pending.get(bank).ok_or(Error::InvalidArgument)?;
        self.read_reg(offset)
    }

    /// Whether the legacy controller reports a pending interrupt to core 0
    pub fn peripheral_pending(&self) -> bool {
        self.read_reg(local_irq_pending(0)).map_or(false, |pending| {
            LocalIrqPending::new(pending).is_set(LOCAL_IRQ::GPU_FAST)
        })
    }

    /// Copy the register page into `buf`
    pub fn snapshot(&self, buf: &mut [u8; PAGE_SIZE]) {
        self.regs.lock().snapshot(buf);
    }

    fn offset_of(&self, address: u64, size: u32) -> Result<usize> {
        let offset = address
            .checked_sub(self.base)
            .filter(|off| *off < PAGE_SIZE as u64)
            .ok_or(Error::Emulator(EmulatorError::InvalidAccess))? as usize;

        if !(size == 4 || size == 8) || offset % size as usize != 0 {
            log::warn!("bcm2836: bad access {:#x}/{}", address, size);
            return Err(EmulatorError::InvalidAccess.into());
        }
        Ok(offset)
    }

    fn write_local(&self, vcpu: VcpuId, offset: usize, value: u64) -> Result<()> {
        let value32 = value as u32;

        match offset {
            LOCAL_CONTROL | LOCAL_PRESCALER | LOCAL_GPU_ROUTING => {
                self.regs.lock().write_u32(offset, value32)
            }
            LOCAL_TIMER_INT_CONTROL0..=LOCAL_TIMER_INT_CONTROL3 => {
                let core = (offset - LOCAL_TIMER_INT_CONTROL0) / LOCAL_PER_CPU_STRIDE;
                self.set_timer_mask(core, value32)
            }
            // Mailbox interrupts are always delivered
            LOCAL_MAILBOX_INT_CONTROL0..=LOCAL_MAILBOX_INT_CONTROL3 => {
                self.regs.lock().write_u32(offset, value32)
            }
            LOCAL_MAILBOX_SET_START..=LOCAL_MAILBOX_SET_END => {
                let (core, _) = decode_mailbox(offset - LOCAL_MAILBOX_SET_START);
                self.send_sgi(core, value32)
            }
            LOCAL_MAILBOX_CLR_START..=LOCAL_MAILBOX_CLR_END => {
                let (core, mailbox) = decode_mailbox(offset - LOCAL_MAILBOX_CLR_START);
                self.clear_sgi(vcpu, core, mailbox, value32)
            }
            BCM2836_RELEASE_OFFSET..=BCM2836_RELEASE_OFFSET_END => {
                if !is_aligned!(offset, BCM2836_RELEASE_STRIDE) {
                    log::warn!("bcm2836: misaligned spin table write at {:#x}", offset);
                    return Err(Error::InvalidArgument);
                }
                let core = (offset - BCM2836_RELEASE_OFFSET) / BCM2836_RELEASE_STRIDE;
                self.release_cpu(core, value)
            }
            _ => {
                log::warn!("bcm2836: unsupported write {:#x} at {:#x}", value, offset);
                Ok(())
            }
        }
    }

    fn write_legacy(&self, vcpu: VcpuId, offset: usize, value: u32) -> Result<()> {
        match offset {
            BCM2835_IRQ_ACK => match value.checked_add(SPI_BASE) {
                Some(virq) if SPI_RANGE.contains(&virq) => self.acknowledge_spi(vcpu, virq),
                _ => {
                    log::warn!("bcm2835: acknowledge of unknown irq {}", value);
                    Err(Error::InvalidArgument)
                }
            },
            BCM2836_IRQ_ACK => self.acknowledge_local(vcpu, value),
            _ => match self.banks.enable_register(offset) {
                Some((bank, enable)) => self.update_enable(vcpu, bank, value, enable),
                None => {
                    log::warn!("bcm2835: unsupported write {:#x} at {:#x}", value, offset);
                    Ok(())
                }
            },
        }
    }
}

impl Emulator for Bcm2836Virq {
    fn name(&self) -> &str {
        BCM2836_VIRQ_NAME
    }

    fn read(&self, _vcpu: VcpuId, address: u64, size: u32) -> Result<u64> {
        let offset = self.offset_of(address, size)?;
        let regs = self.regs.lock();
        match size {
            8 => regs.read_u64(offset),
            _ => regs.read_u32(offset).map(u64::from),
        }
    }

    fn write(&self, vcpu: VcpuId, address: u64, value: u64, size: u32) -> Result<()> {
        let offset = self.offset_of(address, size)?;
        if offset >= BCM2835_INC_OFFSET {
            self.write_legacy(vcpu, offset, value as u32)
        } else {
            self.write_local(vcpu, offset, value)
        }
    }

    fn reset(&self) {
        Bcm2836Virq::reset(self);
    }

    fn teardown(&self) {
        let Ok(vm) = self.vm() else {
            return;
        };

        if let Err(err) = vm.destroy_guest_mapping(self.base, PAGE_SIZE) {
            log::warn!("bcm2836: VM {}: unmap failed: {:?}", vm.id(), err);
        }
        if let Err(err) = vm.unregister_vdev(self.base) {
            log::warn!("bcm2836: VM {}: unregister failed: {:?}", vm.id(), err);
        }
        log::info!("bcm2836: VM {}: controller removed", vm.id());
    }
}

impl VirqChip for Bcm2836Virq {
    fn name(&self) -> &str {
        BCM2836_VIRQ_NAME
    }

    fn send_virq(&self, vcpu: VcpuId, virq: Virq) -> Result<()> {
        Bcm2836Virq::send_virq(self, vcpu, virq)
    }
}

impl core::fmt::Debug for Bcm2836Virq {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bcm2836Virq")
            .field("base", &format_args!("{:#x}", self.base))
            .field("nr_cpus", &self.local.nr_cpus())
            .finish()
    }
}
