//! Test doubles for emulated devices
//!
//! [`MockVm`] records every call a device makes into its VM so tests can
//! assert on the exact sequence.

use crate::config::VmConfig;
use crate::core::irq::{Virq, VirqOps};
use crate::core::mm::{GuestPhysAddr, IoPage, MapFlags, PageAllocator, VirtAddr};
use crate::core::vmm::{VcpuId, Vm, VmId};
use crate::emulator::bcm2836::Bcm2836Virq;
use crate::emulator::Emulator;
use crate::{Error, Result};
use std::string::String;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::vec::Vec;

/// A call made into [`MockVm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Enable(VcpuId, Virq),
    Disable(VcpuId, Virq),
    ClearPending(VcpuId, Virq),
    Deliver(VcpuId, Virq),
    PowerOn(u64, u64, u64),
    Map(GuestPhysAddr, VirtAddr, usize, MapFlags),
    Unmap(GuestPhysAddr),
    Register(GuestPhysAddr, usize, String),
    Unregister(GuestPhysAddr),
}

struct Region {
    base: GuestPhysAddr,
    size: usize,
    device: Arc<dyn Emulator>,
}

/// Recording VM
pub struct MockVm {
    config: VmConfig,
    calls: Mutex<Vec<Call>>,
    regions: Mutex<Vec<Region>>,
    hidden_vcpu: Mutex<Option<usize>>,
    fail_mapping: AtomicBool,
    loop_back: Mutex<Option<Weak<Bcm2836Virq>>>,
}

impl MockVm {
    pub fn new(config: VmConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            calls: Mutex::new(Vec::new()),
            regions: Mutex::new(Vec::new()),
            hidden_vcpu: Mutex::new(None),
            fail_mapping: AtomicBool::new(false),
            loop_back: Mutex::new(None),
        })
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Make `get_vcpu(index)` fail
    pub fn hide_vcpu(&self, index: usize) {
        *self.hidden_vcpu.lock().unwrap() = Some(index);
    }

    /// Make `create_guest_mapping` fail
    pub fn fail_mapping(&self) {
        self.fail_mapping.store(true, Ordering::SeqCst);
    }

    /// Feed delivered virqs back into `dev`
    pub fn loop_back(&self, dev: &Arc<Bcm2836Virq>) {
        *self.loop_back.lock().unwrap() = Some(Arc::downgrade(dev));
    }

    /// Number of registered devices
    pub fn device_count(&self) -> usize {
        self.regions.lock().unwrap().len()
    }

    /// Route a trapped 32-bit write to the registered device
    pub fn dispatch_write(&self, vcpu: VcpuId, address: u64, value: u64) -> Result<()> {
        let device = self
            .regions
            .lock()
            .unwrap()
            .iter()
            .find(|r| address >= r.base && address < r.base + r.size as u64)
            .map(|r| r.device.clone())
            .ok_or(Error::NotFound)?;
        device.write(vcpu, address, value, 4)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl VirqOps for MockVm {
    fn virq_enable(&self, vcpu: VcpuId, virq: Virq) {
        self.record(Call::Enable(vcpu, virq));
    }

    fn virq_disable(&self, vcpu: VcpuId, virq: Virq) {
        self.record(Call::Disable(vcpu, virq));
    }

    fn clear_pending_virq(&self, vcpu: VcpuId, virq: Virq) {
        self.record(Call::ClearPending(vcpu, virq));
    }

    fn send_virq_to_vcpu(&self, target: VcpuId, virq: Virq) -> Result<()> {
        self.record(Call::Deliver(target, virq));
        let dev = self.loop_back.lock().unwrap().as_ref().and_then(Weak::upgrade);
        match dev {
            Some(dev) => dev.send_virq(target, virq),
            None => Ok(()),
        }
    }
}

impl Vm for MockVm {
    fn id(&self) -> VmId {
        1
    }

    fn config(&self) -> &VmConfig {
        &self.config
    }

    fn get_vcpu(&self, index: usize) -> Option<VcpuId> {
        let hidden = *self.hidden_vcpu.lock().unwrap();
        (index < self.config.vcpu_count && hidden != Some(index)).then_some(index as VcpuId)
    }

    fn vcpu_power_on(&self, affinity: u64, entry: u64, arg: u64) -> Result<()> {
        self.record(Call::PowerOn(affinity, entry, arg));
        Ok(())
    }

    fn create_guest_mapping(
        &self,
        ipa: GuestPhysAddr,
        host: VirtAddr,
        size: usize,
        flags: MapFlags,
    ) -> Result<()> {
        if self.fail_mapping.load(Ordering::SeqCst) {
            return Err(Error::OutOfMemory);
        }
        self.record(Call::Map(ipa, host, size, flags));
        Ok(())
    }

    fn destroy_guest_mapping(&self, ipa: GuestPhysAddr, _size: usize) -> Result<()> {
        self.record(Call::Unmap(ipa));
        Ok(())
    }

    fn register_vdev(
        &self,
        base: GuestPhysAddr,
        size: usize,
        device: Arc<dyn Emulator>,
    ) -> Result<()> {
        self.record(Call::Register(base, size, String::from(device.name())));
        self.regions.lock().unwrap().push(Region { base, size, device });
        Ok(())
    }

    fn unregister_vdev(&self, base: GuestPhysAddr) -> Result<()> {
        self.record(Call::Unregister(base));
        let mut regions = self.regions.lock().unwrap();
        let before = regions.len();
        regions.retain(|r| r.base != base);
        if regions.len() == before {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}

/// Page allocator that is always out of memory
pub struct FailingAllocator;

impl PageAllocator for FailingAllocator {
    fn alloc_io_page(&self) -> Result<IoPage> {
        Err(Error::OutOfMemory)
    }
}
