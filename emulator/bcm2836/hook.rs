//! Controller lifecycle hook
//!
//! Attaches a [`Bcm2836Virq`] to every native VM at creation time. VMs
//! configured for the virtual GIC are handed to the pass-through hook.

use super::regs::BCM2836_INC_BASE;
use super::{BankLayout, Bcm2836Virq, BCM2836_VIRQ_NAME};
use crate::config::validate_vm_config;
use crate::core::irq::VirqController;
use crate::core::mm::{MapFlags, PageAllocator, PAGE_SIZE};
use crate::core::vmm::hooks::VmCreateHook;
use crate::core::vmm::Vm;
use crate::emulator::Emulator;
use crate::Result;
use alloc::sync::Arc;

/// VM creation hook installing the BCM2836 controller
pub struct Bcm2836VirqHook {
    allocator: Arc<dyn PageAllocator>,
    pass_through: Option<Arc<dyn VmCreateHook>>,
}

impl Bcm2836VirqHook {
    /// Create the hook; register pages come from `allocator`
    pub fn new(allocator: Arc<dyn PageAllocator>) -> Self {
        Self {
            allocator,
            pass_through: None,
        }
    }

    /// Hand non-native VMs to `hook`
    pub fn with_pass_through(mut self, hook: Arc<dyn VmCreateHook>) -> Self {
        self.pass_through = Some(hook);
        self
    }

    fn attach(&self, vm: &Arc<dyn Vm>) -> Result<Arc<Bcm2836Virq>> {
        validate_vm_config(vm.config())?;

        let page = self.allocator.alloc_io_page().map_err(|err| {
            log::error!("VM {}: no page for {}", vm.id(), BCM2836_VIRQ_NAME);
            err
        })?;

        let dev = Arc::new(Bcm2836Virq::new(vm, page, BankLayout::bcm2835())?);
        dev.reset();

        let base = dev.base();
        vm.register_vdev(base, PAGE_SIZE, dev.clone() as Arc<dyn Emulator>)?;

        if let Err(err) =
            vm.create_guest_mapping(base, dev.host_addr(), PAGE_SIZE, MapFlags::IO | MapFlags::RO)
        {
            log::error!("VM {}: cannot map {} at {:#x}", vm.id(), BCM2836_VIRQ_NAME, base);
            if vm.unregister_vdev(base).is_err() {
                log::warn!("VM {}: {} left registered", vm.id(), BCM2836_VIRQ_NAME);
            }
            return Err(err);
        }

        Ok(dev)
    }
}

impl VmCreateHook for Bcm2836VirqHook {
    fn name(&self) -> &str {
        BCM2836_VIRQ_NAME
    }

    fn create_vm(&self, vm: &Arc<dyn Vm>) -> Result<Option<VirqController>> {
        if !vm.config().irq_model.is_native() {
            return match &self.pass_through {
                Some(hook) => hook.create_vm(vm),
                None => Ok(None),
            };
        }

        let dev = self.attach(vm)?;
        log::info!(
            "VM {}: {} at {:#x} with {} cores",
            vm.id(),
            BCM2836_VIRQ_NAME,
            BCM2836_INC_BASE,
            dev.nr_cpus()
        );
        Ok(Some(VirqController::Bcm2836(dev)))
    }
}
