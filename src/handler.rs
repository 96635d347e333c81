//! VM-exit handlers for tracked user-mode threads.
//!
//! Two exits matter here:
//! 1. #DB / #BP raised by a tracked thread: capture its state, notify the
//!    controller, park the thread on its spin region.
//! 2. CPUID executed by a parked thread: poll the mailbox and apply at most
//!    one command.
//!
//! Both run in VMX root on the processor that took the exit. Neither blocks
//! nor allocates.

use crate::context::VmExitContext;
use crate::debugger::UserDebugger;
use crate::insn;
use crate::ops::UdOps;
use crate::packet::{PausePacket, PausingReason};
use crate::pause;
use crate::platform;
use crate::spin_region;
use crate::token::Token;

/// Outcome of [`UserDebugger::handle_breakpoint_and_debug_exception`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapResult {
    /// The thread is parked and waits for a command.
    Paused(Token),
    /// Not a tracked thread, or the subsystem is off. Deliver the exception
    /// to the guest as usual.
    NotTracked,
    /// Called outside VMX root. The exit path is inconsistent.
    NotRootMode,
}

impl<O: UdOps> UserDebugger<O> {
    /// Handle a #DB or #BP taken by a guest user-mode thread.
    ///
    /// The thread is paused even if the notification cannot be sent; a
    /// halted thread the controller never heard of is preferable to one
    /// running unsupervised.
    pub fn handle_breakpoint_and_debug_exception<C: VmExitContext + ?Sized>(
        &self,
        ctx: &mut C,
        reason: PausingReason,
        event_tag: Option<u64>,
    ) -> TrapResult {
        if !self.is_active() {
            return TrapResult::NotTracked;
        }

        let process_id = ctx.current_process_id();
        let thread_id = ctx.current_thread_id();

        // Breaking is only supported in vmx-root mode
        if !ctx.is_root_mode() {
            log::error!(
                "udbg: trap for pid={} tid={} handled outside vmx-root",
                process_id,
                thread_id
            );
            return TrapResult::NotRootMode;
        }

        let Some(session) = self.registry().find_by_thread(process_id, thread_id) else {
            return TrapResult::NotTracked;
        };

        let cpu = platform::cpu_id();
        let _owner = session.claim(cpu);

        let rip = ctx.guest_rip();
        let mut packet = PausePacket::zeroed();
        packet.token = session.token().as_raw();
        packet.rip = rip;
        packet.rflags = ctx.guest_rflags();
        packet.event_tag = event_tag.unwrap_or(0);
        packet.process_id = process_id;
        packet.thread_id = thread_id;
        packet.reason = reason as u32;
        packet.cpu_id = cpu;
        packet.is_32bit_address = ctx.is_guest_user_mode_32bit() as u8;
        packet.guest_regs = *ctx.guest_registers();

        let len = insn::fetch_length(rip, ctx.instruction_length_hint());
        let copied = match self
            .ops()
            .read_guest_memory_safe(rip, &mut packet.instruction_bytes[..len])
        {
            Ok(n) => n.min(len),
            Err(e) => {
                log::debug!("udbg: instruction read at {:#x} failed: {:?}", rip, e);
                0
            }
        };
        packet.read_instruction_len = copied as u32;

        if let Err(e) = self.ops().send_pause_notification(&packet) {
            log::warn!(
                "udbg: pause notification for token={} dropped: {:?}",
                session.token(),
                e
            );
        }

        pause::spin_thread_on_nop(&session, ctx);

        log::trace!(
            "udbg: {} pid={} tid={} rip={:#x} cpu={} paused",
            reason.label(),
            process_id,
            thread_id,
            rip,
            cpu
        );
        TrapResult::Paused(session.token())
    }

    /// Check for user-mode commands on a CPUID exit.
    ///
    /// Returns `false` for an ordinary CPUID: the subsystem is off, the thread
    /// is not tracked, or it is not paused. Returns `true` when the exit came
    /// from a parked thread's spin loop; the caller must then skip CPUID
    /// emulation so the thread's registers stay untouched.
    pub fn check_for_command<C: VmExitContext + ?Sized>(&self, ctx: &mut C) -> bool {
        if !self.is_active() {
            return false;
        }

        let Some(session) = self
            .registry()
            .find_by_thread(ctx.current_process_id(), ctx.current_thread_id())
        else {
            return false;
        };

        // A tracked thread executing a regular CPUID.
        if !session.is_paused() {
            return false;
        }

        let _owner = session.claim(platform::cpu_id());

        if !spin_region::is_in_spin_loop(session.spin_region(), ctx.guest_rip()) {
            log::warn!(
                "udbg: paused token={} polled from {:#x}, outside spin region {:#x}",
                session.token(),
                ctx.guest_rip(),
                session.spin_region()
            );
        }

        // Only one command per poll.
        if let Some(action) = session.mailbox().pop() {
            self.perform_command(&session, &action, ctx);
        }

        true
    }
}
