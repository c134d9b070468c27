//! BCM2836 / BCM2835 interrupt controller register layout
//!
//! Both controllers are emulated inside a single page mapped at
//! `0x4000_0000` in the guest:
//!
//! ```text
//! 0x000 - 0x0ff : BCM2836 per-core local interrupt controller
//! 0x100 - 0x11f : spin table release addresses (8 bytes per core)
//! 0x200 - 0x2ff : BCM2835 legacy ARM interrupt controller
//! ```
//!
//! The BCM2835 controller lives at 0x7e00b200 on real hardware, which is not
//! page aligned, so it is folded into the local controller's page at the
//! same sub-page offset. All offsets below are relative to the page base.

use tock_registers::fields::Field;
use tock_registers::register_bitfields;
use tock_registers::LocalRegisterCopy;

/// Guest physical base of the emulated controller page
pub const BCM2836_INC_BASE: u64 = 0x4000_0000;

/// Number of cores the local controller describes
pub const NR_LOCAL_CPUS: usize = 4;

/// Number of mailboxes per core
pub const NR_MAILBOXES: usize = 4;

// BCM2836 local controller
pub const LOCAL_CONTROL: usize = 0x000;
pub const LOCAL_PRESCALER: usize = 0x008;
pub const LOCAL_GPU_ROUTING: usize = 0x00c;
pub const LOCAL_TIMER_INT_CONTROL0: usize = 0x040;
pub const LOCAL_TIMER_INT_CONTROL3: usize = 0x04c;
pub const LOCAL_MAILBOX_INT_CONTROL0: usize = 0x050;
pub const LOCAL_MAILBOX_INT_CONTROL3: usize = 0x05c;
pub const LOCAL_IRQ_PENDING0: usize = 0x060;
pub const LOCAL_MAILBOX0_SET0: usize = 0x080;
pub const LOCAL_MAILBOX0_CLR0: usize = 0x0c0;

/// Per-core stride of the timer/mailbox control and pending registers
pub const LOCAL_PER_CPU_STRIDE: usize = 4;

/// Per-core stride of the mailbox set/clear register blocks
pub const LOCAL_MAILBOX_CPU_STRIDE: usize = 16;

pub const LOCAL_MAILBOX_SET_START: usize = LOCAL_MAILBOX0_SET0;
pub const LOCAL_MAILBOX_SET_END: usize =
    LOCAL_MAILBOX0_SET0 + NR_LOCAL_CPUS * LOCAL_MAILBOX_CPU_STRIDE - 4;
pub const LOCAL_MAILBOX_CLR_START: usize = LOCAL_MAILBOX0_CLR0;
pub const LOCAL_MAILBOX_CLR_END: usize =
    LOCAL_MAILBOX0_CLR0 + NR_LOCAL_CPUS * LOCAL_MAILBOX_CPU_STRIDE - 4;

// Spin table used to release secondary VCPUs of the native VM
pub const BCM2836_RELEASE_OFFSET: usize = 0x100;
pub const BCM2836_RELEASE_STRIDE: usize = 8;
pub const BCM2836_RELEASE_OFFSET_END: usize =
    BCM2836_RELEASE_OFFSET + NR_LOCAL_CPUS * BCM2836_RELEASE_STRIDE - BCM2836_RELEASE_STRIDE;

// BCM2835 legacy controller
pub const BCM2835_INC_OFFSET: usize = 0x200;
pub const BCM2835_IRQ_BASIC_PENDING: usize = BCM2835_INC_OFFSET + 0x00;
pub const BCM2835_IRQ_PENDING1: usize = BCM2835_INC_OFFSET + 0x04;
pub const BCM2835_IRQ_PENDING2: usize = BCM2835_INC_OFFSET + 0x08;
pub const BCM2835_IRQ_ENABLE1: usize = BCM2835_INC_OFFSET + 0x10;
pub const BCM2835_IRQ_ENABLE2: usize = BCM2835_INC_OFFSET + 0x14;
pub const BCM2835_IRQ_BASIC_ENABLE: usize = BCM2835_INC_OFFSET + 0x18;
pub const BCM2835_IRQ_DISABLE1: usize = BCM2835_INC_OFFSET + 0x1c;
pub const BCM2835_IRQ_DISABLE2: usize = BCM2835_INC_OFFSET + 0x20;
pub const BCM2835_IRQ_DISABLE_BASIC: usize = BCM2835_INC_OFFSET + 0x24;

/// Paravirtual acknowledge of a legacy peripheral interrupt (value = hwirq)
pub const BCM2835_IRQ_ACK: usize = BCM2835_INC_OFFSET + 0x28;

/// Paravirtual acknowledge of a local interrupt (value = local irq bit)
pub const BCM2836_IRQ_ACK: usize = BCM2835_INC_OFFSET + 0x2c;

register_bitfields! [
    u32,
    // LOCAL_IRQ_PENDINGn
    pub LOCAL_IRQ [
        CNTPSIRQ 0,
        CNTPNSIRQ 1,
        CNTHPIRQ 2,
        CNTVIRQ 3,
        MAILBOX0 4,
        MAILBOX1 5,
        MAILBOX2 6,
        MAILBOX3 7,
        GPU_FAST 8,
        PMU_FAST 9,
        AXI 10,
        LOCAL_TIMER 11
    ],
    // LOCAL_TIMER_INT_CONTROLn
    pub TIMER_INT_CONTROL [
        CNTPSIRQ 0,
        CNTPNSIRQ 1,
        CNTHPIRQ 2,
        CNTVIRQ 3,
        CNTPSFIQ 4,
        CNTPNSFIQ 5,
        CNTHPFIQ 6,
        CNTVFIQ 7
    ]
];

/// Host-side copy of a LOCAL_IRQ_PENDINGn value
pub type LocalIrqPending = LocalRegisterCopy<u32, LOCAL_IRQ::Register>;

/// Host-side copy of a LOCAL_TIMER_INT_CONTROLn value
pub type TimerIntControl = LocalRegisterCopy<u32, TIMER_INT_CONTROL::Register>;

/// Summary bit of each mailbox in LOCAL_IRQ_PENDINGn
pub const LOCAL_IRQ_MAILBOXES: [Field<u32, LOCAL_IRQ::Register>; NR_MAILBOXES] = [
    LOCAL_IRQ::MAILBOX0,
    LOCAL_IRQ::MAILBOX1,
    LOCAL_IRQ::MAILBOX2,
    LOCAL_IRQ::MAILBOX3,
];

/// IRQ enables of the four per-core timers, in PPI order
pub const TIMER_IRQ_SOURCES: [Field<u32, TIMER_INT_CONTROL::Register>; 4] = [
    TIMER_INT_CONTROL::CNTPSIRQ,
    TIMER_INT_CONTROL::CNTPNSIRQ,
    TIMER_INT_CONTROL::CNTHPIRQ,
    TIMER_INT_CONTROL::CNTVIRQ,
];

/// Register mask of a single-bit local interrupt source
pub const fn local_irq_mask(field: Field<u32, LOCAL_IRQ::Register>) -> u32 {
    field.mask << field.shift
}

/// Offset of LOCAL_TIMER_INT_CONTROL for `cpu`
pub const fn local_timer_int_control(cpu: usize) -> usize {
    LOCAL_TIMER_INT_CONTROL0 + cpu * LOCAL_PER_CPU_STRIDE
}

/// Offset of LOCAL_IRQ_PENDING for `cpu`
pub const fn local_irq_pending(cpu: usize) -> usize {
    LOCAL_IRQ_PENDING0 + cpu * LOCAL_PER_CPU_STRIDE
}

/// Offset of the mailbox `mailbox` set register of `cpu`
pub const fn local_mailbox_set(cpu: usize, mailbox: usize) -> usize {
    LOCAL_MAILBOX0_SET0 + cpu * LOCAL_MAILBOX_CPU_STRIDE + mailbox * 4
}

/// Offset of the mailbox `mailbox` read/clear register of `cpu`
pub const fn local_mailbox_clr(cpu: usize, mailbox: usize) -> usize {
    LOCAL_MAILBOX0_CLR0 + cpu * LOCAL_MAILBOX_CPU_STRIDE + mailbox * 4
}

/// Offset of the spin table release slot of `cpu`
pub const fn release_slot(cpu: usize) -> usize {
    BCM2836_RELEASE_OFFSET + cpu * BCM2836_RELEASE_STRIDE
}

/// Split a mailbox set/clear offset relative to its block start into (cpu, mailbox)
pub const fn decode_mailbox(rel: usize) -> (usize, usize) {
    (rel / LOCAL_MAILBOX_CPU_STRIDE, (rel % LOCAL_MAILBOX_CPU_STRIDE) / 4)
}
