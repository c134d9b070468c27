//! Core hypervisor interfaces
//!
//! This module contains the pieces of the hypervisor core the interrupt
//! emulation is built on: synchronization, I/O page management, virq
//! classification and the virtual machine interfaces the emulator consumes.

pub mod irq;
pub mod mm;
pub mod sync;
pub mod vmm;
