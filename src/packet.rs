//! Records exchanged with the controller.
//!
//! `PausePacket` goes out once per pause, `CommandPacket` comes in for every
//! controller request. Both are plain `repr(C)` records so the transport can
//! ship them as bytes.

use crate::insn::INSTRUCTION_BUFFER_SIZE;
use crate::mailbox::PendingAction;
use crate::regs::GuestRegisters;
use crate::token::Token;

/// Why a thread was paused.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PausingReason {
    /// `int3` executed by the guest thread.
    SoftwareBreakpoint = 1,
    /// Debug register match (#DB).
    HardwareDebugRegister = 2,
    /// Single step completed (#DB with TF).
    Stepped = 3,
    /// A previously armed event fired; see `event_tag`.
    EventTriggered = 4,
}

impl PausingReason {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Self::SoftwareBreakpoint),
            2 => Some(Self::HardwareDebugRegister),
            3 => Some(Self::Stepped),
            4 => Some(Self::EventTriggered),
            _ => None,
        }
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SoftwareBreakpoint => "breakpoint",
            Self::HardwareDebugRegister => "hw-breakpoint",
            Self::Stepped => "step",
            Self::EventTriggered => "event",
        }
    }
}

/// Pause notification sent to the controller.
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy)]
pub struct PausePacket {
    /// Token of the paused session, used to address the reply.
    pub token: u64,
    /// Faulting instruction pointer.
    pub rip: u64,
    /// RFLAGS at the trap, lets the controller resolve conditional jumps.
    pub rflags: u64,
    /// Tag of the event that caused the pause, 0 if none.
    pub event_tag: u64,
    pub process_id: u32,
    pub thread_id: u32,
    /// Raw [`PausingReason`].
    pub reason: u32,
    /// Number of valid bytes in `instruction_bytes`.
    pub read_instruction_len: u32,
    /// Physical CPU that took the trap.
    pub cpu_id: u32,
    /// Non-zero when the faulting code uses 32-bit addressing.
    pub is_32bit_address: u8,
    pub _pad: [u8; 3],
    /// Bytes at `rip`, for disassembly on the controller side.
    pub instruction_bytes: [u8; INSTRUCTION_BUFFER_SIZE],
    pub guest_regs: GuestRegisters,
}

const _: () = assert!(core::mem::size_of::<PausePacket>() == 200);

impl PausePacket {
    /// An all-zero packet.
    pub const fn zeroed() -> Self {
        Self {
            token: 0,
            rip: 0,
            rflags: 0,
            event_tag: 0,
            process_id: 0,
            thread_id: 0,
            reason: 0,
            read_instruction_len: 0,
            cpu_id: 0,
            is_32bit_address: 0,
            _pad: [0; 3],
            instruction_bytes: [0; INSTRUCTION_BUFFER_SIZE],
            guest_regs: GuestRegisters {
                rax: 0,
                rcx: 0,
                rdx: 0,
                rbx: 0,
                rsp: 0,
                rbp: 0,
                rsi: 0,
                rdi: 0,
                r8: 0,
                r9: 0,
                r10: 0,
                r11: 0,
                r12: 0,
                r13: 0,
                r14: 0,
                r15: 0,
            },
        }
    }

    pub fn token(&self) -> Token {
        Token::from_raw(self.token)
    }

    pub fn reason(&self) -> Option<PausingReason> {
        PausingReason::from_raw(self.reason)
    }

    pub fn event_tag(&self) -> Option<u64> {
        (self.event_tag != 0).then_some(self.event_tag)
    }

    /// The instruction bytes actually read from the guest.
    pub fn instruction(&self) -> &[u8] {
        let len = (self.read_instruction_len as usize).min(INSTRUCTION_BUFFER_SIZE);
        &self.instruction_bytes[..len]
    }

    /// View this packet as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            core::slice::from_raw_parts(
                self as *const Self as *const u8,
                core::mem::size_of::<Self>(),
            )
        }
    }
}

/// Command request from the controller.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket {
    /// Raw token of the target session.
    pub token: u64,
    pub action: PendingAction,
}

impl CommandPacket {
    pub fn new(token: Token, action: PendingAction) -> Self {
        Self {
            token: token.as_raw(),
            action,
        }
    }

    pub fn token(&self) -> Token {
        Token::from_raw(self.token)
    }
}
