//! Memory management module
//!
//! The interrupt emulator only needs a sliver of memory management: single
//! host pages that back emulated register files, and the flags used when
//! those pages are mapped into a guest's stage-2 address space.

pub mod page;

// Re-export commonly used types
pub use page::{GlobalPageAllocator, IoPage, PageAllocator};

use bitflags::bitflags;

/// Guest physical (intermediate physical) address type
pub type GuestPhysAddr = u64;

/// Host virtual address type
pub type VirtAddr = u64;

/// Page size (4KB)
pub const PAGE_SIZE: usize = 4096;

bitflags! {
    /// Stage-2 mapping attributes for guest mappings
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MapFlags: u32 {
        /// Device / I/O memory
        const IO = 1 << 1;
        /// Guest may only read
        const RO = 1 << 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_flags() {
        let flags = MapFlags::IO | MapFlags::RO;
        assert!(flags.contains(MapFlags::RO));
        assert_eq!(flags.bits(), 0b110);
    }
}
