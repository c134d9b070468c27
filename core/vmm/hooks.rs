//! VM creation hooks
//!
//! Device factories that must run when a virtual machine is created are
//! registered in a [`VmHooks`] registry, which the VM-creation code owns and
//! runs explicitly. Interrupt controller factories return the controller
//! they attached so the caller can store it with the VM.

use crate::core::irq::VirqController;
use crate::core::vmm::Vm;
use crate::{Error, Result};
use alloc::sync::Arc;
use heapless::Vec;

/// Maximum number of hooks a registry can hold
pub const MAX_VM_HOOKS: usize = 8;

/// A factory run for every newly created VM
pub trait VmCreateHook: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Attach devices to `vm`
    ///
    /// Returns the interrupt controller the hook installed, if any.
    fn create_vm(&self, vm: &Arc<dyn Vm>) -> Result<Option<VirqController>>;
}

/// Ordered registry of VM creation hooks
pub struct VmHooks {
    hooks: Vec<Arc<dyn VmCreateHook>, MAX_VM_HOOKS>,
}

impl VmHooks {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Register a hook; hooks run in registration order
    pub fn register(&mut self, hook: Arc<dyn VmCreateHook>) -> Result<()> {
        log::debug!("Registering VM create hook '{}'", hook.name());
        self.hooks.push(hook).map_err(|_| Error::ResourceUnavailable)
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hook is registered
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook against `vm`, aborting on the first failure
    ///
    /// At most one hook may install an interrupt controller.
    pub fn run_create(&self, vm: &Arc<dyn Vm>) -> Result<Option<VirqController>> {
        let mut controller: Option<VirqController> = None;

        for hook in self.hooks.iter() {
            let installed = hook.create_vm(vm).map_err(|err| {
                log::error!("VM {}: hook '{}' failed: {:?}", vm.id(), hook.name(), err);
                err
            })?;

            if let Some(installed) = installed {
                if let Some(existing) = &controller {
                    log::error!(
                        "VM {}: hook '{}' installed {} over {}",
                        vm.id(),
                        hook.name(),
                        installed.name(),
                        existing.name()
                    );
                    return Err(Error::InvalidState);
                }
                controller = Some(installed);
            }
        }

        Ok(controller)
    }
}

impl Default for VmHooks {
    fn default() -> Self {
        Self::new()
    }
}
