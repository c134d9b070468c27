//! Emulated register file
//!
//! The register file is the page the guest maps read-only at the
//! controller's base address. Guest reads never trap, so every write made
//! here must leave the page exactly as real hardware would present it.

use crate::core::mm::{IoPage, VirtAddr, PAGE_SIZE};
use crate::emulator::Error as EmulatorError;
use crate::Result;
use core::ptr::NonNull;
use volatile::VolatilePtr;

/// Page-sized register file shared read-only with the guest
#[derive(Debug)]
pub struct RegisterFile {
    /// Backing page
    page: IoPage,
}

impl RegisterFile {
    /// Wrap a freshly allocated page
    pub fn new(page: IoPage) -> Self {
        Self { page }
    }

    /// Host address of the page, for the guest mapping
    pub fn host_addr(&self) -> VirtAddr {
        self.page.host_addr()
    }

    /// Zero every register
    pub fn reset(&mut self) {
        self.page.zero();
    }

    fn ptr<T>(&self, offset: usize) -> Result<NonNull<T>> {
        let size = core::mem::size_of::<T>();
        if offset % size != 0 || offset.checked_add(size).map_or(true, |end| end > PAGE_SIZE) {
            log::warn!("bcm2836: bad register access {:#x}/{}", offset, size);
            return Err(EmulatorError::InvalidAccess.into());
        }

        // SAFETY: offset + size lies inside the page and is naturally aligned
        // because the page itself is page aligned.
        let raw = unsafe { self.page.as_ptr().add(offset) };
        NonNull::new(raw.cast::<T>()).ok_or_else(|| EmulatorError::InvalidAccess.into())
    }

    /// Read a 32-bit register
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let ptr = self.ptr::<u32>(offset)?;
        // SAFETY: checked in ptr(); the page outlives the access.
        Ok(unsafe { VolatilePtr::new(ptr) }.read())
    }

    /// Write a 32-bit register
    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let ptr = self.ptr::<u32>(offset)?;
        // SAFETY: checked in ptr(); &mut self serializes host writers.
        unsafe { VolatilePtr::new(ptr) }.write(value);
        Ok(())
    }

    /// Read a 64-bit register
    pub fn read_u64(&self, offset: usize) -> Result<u64> {
        let ptr = self.ptr::<u64>(offset)?;
        // SAFETY: checked in ptr().
        Ok(unsafe { VolatilePtr::new(ptr) }.read())
    }

    /// Write a 64-bit register
    pub fn write_u64(&mut self, offset: usize, value: u64) -> Result<()> {
        let ptr = self.ptr::<u64>(offset)?;
        // SAFETY: checked in ptr().
        unsafe { VolatilePtr::new(ptr) }.write(value);
        Ok(())
    }

    /// Read-modify-write a 32-bit register, returning the new value
    pub fn modify_u32(&mut self, offset: usize, f: impl FnOnce(u32) -> u32) -> Result<u32> {
        let value = f(self.read_u32(offset)?);
        self.write_u32(offset, value)?;
        Ok(value)
    }

    /// Set `mask` in a 32-bit register
    pub fn set_bits(&mut self, offset: usize, mask: u32) -> Result<u32> {
        self.modify_u32(offset, |v| v | mask)
    }

    /// Clear `mask` in a 32-bit register
    pub fn clear_bits(&mut self, offset: usize, mask: u32) -> Result<u32> {
        self.modify_u32(offset, |v| v & !mask)
    }

    /// Copy the whole page into `buf`
    pub fn snapshot(&self, buf: &mut [u8; PAGE_SIZE]) {
        for (index, chunk) in buf.chunks_exact_mut(4).enumerate() {
            // Every 4-byte aligned offset below PAGE_SIZE is valid
            let word = self.read_u32(index * 4).unwrap_or(0);
            chunk.copy_from_slice(&word.to_ne_bytes());
        }
    }
}
