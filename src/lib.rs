//! AxVisor user-mode debugger.
//!
//! Hypervisor-assisted debugging of guest user-mode threads. The hypervisor
//! intercepts #DB and #BP raised by tracked threads, parks the faulting thread
//! on a spin loop in its own address space, reports the pause to a remote
//! controller and resumes the thread when the controller says so. The
//! debuggee's code is never patched and no in-guest debug API is involved.
//!
//! # Components
//!
//! - [`registry`] - tracked threads, addressed by [`Token`]
//! - [`pause`] - parking a thread on its spin region and restoring it
//! - [`handler`] - the #DB/#BP and CPUID exit handlers
//! - [`mailbox`] / [`dispatch`] - lock-free per-thread command queue
//! - [`debugger`] - activation and teardown
//!
//! The embedding hypervisor supplies [`UdOps`] (guest memory, transport,
//! broadcast) and a [`VmExitContext`] for every exit it forwards.
//!
//! # Quick Start
//!
//! ```ignore
//! use axudbg::{PausingReason, UdConfig, UserDebugger};
//!
//! let udbg = UserDebugger::new(UdConfig::default(), MyOps);
//! udbg.activate()?;
//!
//! // attach path (VMX non-root)
//! let token = udbg.attach_thread(pid, tid, spin_region_gva)?;
//!
//! // #BP exit
//! udbg.handle_breakpoint_and_debug_exception(&mut exit, PausingReason::SoftwareBreakpoint, None);
//!
//! // controller request
//! udbg.dispatch_command(&CommandPacket::new(token, PendingAction::continue_thread()))?;
//!
//! // CPUID exit
//! if udbg.check_for_command(&mut exit) {
//!     // skip CPUID emulation
//! }
//! ```

#![no_std]

extern crate alloc;

// =============================================================================
// Platform Abstraction (for testing support)
// =============================================================================

pub mod platform;

// =============================================================================
// Ambient
// =============================================================================

pub mod config;
pub mod error;

// =============================================================================
// Hypervisor Seams
// =============================================================================

pub mod context;
pub mod ops;
pub mod regs;

// =============================================================================
// Sessions
// =============================================================================

pub mod mailbox;
pub mod registry;
pub mod session;
pub mod token;

// =============================================================================
// Exit Handling
// =============================================================================

pub mod debugger;
pub mod dispatch;
pub mod handler;
pub mod insn;
pub mod packet;
pub mod pause;
pub mod spin_region;

// Re-export key types for convenience
pub use config::UdConfig;
pub use context::VmExitContext;
pub use debugger::{UdState, UserDebugger};
pub use error::Error;
pub use handler::TrapResult;
pub use mailbox::{ActionKind, MAX_USER_ACTIONS_FOR_THREADS, PendingAction};
pub use ops::UdOps;
pub use packet::{CommandPacket, PausePacket, PausingReason};
pub use regs::GuestRegisters;
pub use session::{SessionInfo, ThreadDebuggingSession};
pub use token::Token;
