//! Guest register snapshot carried in pause notifications.

/// The collection of the guest general purpose register values.
///
/// RIP and RFLAGS travel separately in [`PausePacket`](crate::packet::PausePacket).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct GuestRegisters {
    pub rax: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbx: u64,
    pub rsp: u64,
    pub rbp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
}

/// RFLAGS bits the controller needs to resolve conditional branches.
pub mod rflags {
    pub const CF: u64 = 1 << 0;
    pub const PF: u64 = 1 << 2;
    pub const ZF: u64 = 1 << 6;
    pub const SF: u64 = 1 << 7;
    pub const TF: u64 = 1 << 8;
    pub const IF: u64 = 1 << 9;
    pub const OF: u64 = 1 << 11;
    /// Bit 1 is architecturally always set.
    pub const RESERVED_1: u64 = 1 << 1;
}
