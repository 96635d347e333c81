//! VM-exit context seam.
//!
//! The VMX machinery that owns the VMCS is outside this crate. Everything the
//! debugger needs from the current exit is expressed by [`VmExitContext`],
//! implemented by the vCPU exit handler for the processor that took the exit.

use crate::regs::GuestRegisters;

/// Live guest state of the VM-exit being handled on this processor.
///
/// Implementations read and write the current VMCS, so a value is only valid
/// on the processor that took the exit and only until the guest is resumed.
pub trait VmExitContext {
    /// Whether the processor is executing in VMX root mode.
    fn is_root_mode(&self) -> bool;

    /// Guest RIP at the time of the exit.
    fn guest_rip(&self) -> u64;

    /// Overwrite guest RIP for the upcoming VM-entry.
    fn set_guest_rip(&mut self, rip: u64);

    fn guest_rsp(&self) -> u64;

    fn set_guest_rsp(&mut self, rsp: u64);

    fn guest_rflags(&self) -> u64;

    /// Instruction length cached by an earlier decode, or 0 when unknown.
    fn instruction_length_hint(&self) -> u32;

    /// Whether the faulting code runs in a 32-bit user-mode code segment.
    fn is_guest_user_mode_32bit(&self) -> bool;

    /// General purpose registers saved on exit.
    fn guest_registers(&self) -> &GuestRegisters;

    /// Request (or cancel) advancing RIP past the exiting instruction on resume.
    fn set_increment_rip(&mut self, increment: bool);

    /// Guest process id of the thread that caused the exit.
    fn current_process_id(&self) -> u32;

    /// Guest thread id of the thread that caused the exit.
    fn current_thread_id(&self) -> u32;
}
