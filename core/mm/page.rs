//! Host I/O pages
//!
//! An [`IoPage`] is a single page-aligned, zero-initialised host page that
//! backs an emulated register file. The page is shared with a guest through
//! a stage-2 mapping, so its contents are only ever touched through raw
//! volatile accesses by the owner.

use crate::core::mm::{VirtAddr, PAGE_SIZE};
use crate::{Error, Result};
use alloc::alloc::{alloc_zeroed, dealloc, Layout};
use core::ptr::NonNull;

/// A page-aligned host page
pub struct IoPage {
    /// Start of the page
    ptr: NonNull<u8>,
}

// SAFETY: the page is exclusively owned; sharing is mediated by its owner.
unsafe impl Send for IoPage {}
unsafe impl Sync for IoPage {}

impl IoPage {
    fn layout() -> Layout {
        // PAGE_SIZE is a non-zero power of two
        Layout::from_size_align(PAGE_SIZE, PAGE_SIZE).unwrap_or_else(|_| Layout::new::<u8>())
    }

    /// Allocate a zeroed page from the global allocator
    pub fn try_new() -> Result<Self> {
        let layout = Self::layout();
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(Error::OutOfMemory)?;
        Ok(Self { ptr })
    }

    /// Raw pointer to the start of the page
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Host virtual address of the page, as passed to stage-2 mapping code
    pub fn host_addr(&self) -> VirtAddr {
        self.ptr.as_ptr() as usize as VirtAddr
    }

    /// Zero the whole page in place
    pub fn zero(&self) {
        // SAFETY: the page is PAGE_SIZE bytes long and owned by self.
        unsafe { core::ptr::write_bytes(self.ptr.as_ptr(), 0, PAGE_SIZE) };
    }
}

impl Drop for IoPage {
    fn drop(&mut self) {
        // SAFETY: allocated in try_new with the same layout.
        unsafe { dealloc(self.ptr.as_ptr(), Self::layout()) };
    }
}

impl core::fmt::Debug for IoPage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IoPage")
            .field("host_addr", &format_args!("{:#x}", self.host_addr()))
            .finish()
    }
}

/// Source of I/O pages for emulated devices
pub trait PageAllocator: Send + Sync {
    /// Allocate one zeroed, page-aligned page
    fn alloc_io_page(&self) -> Result<IoPage>;
}

/// Page allocator backed by the global heap
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalPageAllocator;

impl PageAllocator for GlobalPageAllocator {
    fn alloc_io_page(&self) -> Result<IoPage> {
        IoPage::try_new()
    }
}
