//! Pause/spin controller.
//!
//! A paused thread is not descheduled. Its RIP is pointed at the spin region,
//! a small loop in its own address space that repeatedly executes CPUID. Each
//! CPUID exits to the hypervisor, which is where the mailbox gets polled.
//! Resuming restores the RIP and RSP saved here.

use crate::context::VmExitContext;
use crate::platform;
use crate::session::ThreadDebuggingSession;

/// Park the thread on its spin region.
///
/// Must run on the processor handling this thread's own exit.
pub fn spin_thread_on_nop<C: VmExitContext + ?Sized>(session: &ThreadDebuggingSession, ctx: &mut C) {
    if session.is_paused() {
        // Saving again would record the spin region as the resume point.
        log::warn!(
            "udbg: token={} paused again at {:#x}, keeping saved context",
            session.token(),
            ctx.guest_rip()
        );
    } else {
        session.save_context(ctx.guest_rip(), ctx.guest_rsp(), platform::time_ns());
    }

    ctx.set_guest_rip(session.spin_region());
    // The exiting instruction is not executed; the spin loop starts at its first byte.
    ctx.set_increment_rip(false);
    session.set_paused(true);

    log::trace!(
        "udbg: token={} spinning at {:#x}",
        session.token(),
        session.spin_region()
    );
}

/// Put the thread back where it was paused.
pub fn continue_thread<C: VmExitContext + ?Sized>(session: &ThreadDebuggingSession, ctx: &mut C) {
    let (rip, rsp) = session.saved_context();
    ctx.set_guest_rip(rip);
    ctx.set_guest_rsp(rsp);

    // Continue the current instruction, don't skip it.
    ctx.set_increment_rip(false);

    session.set_paused(false);
    log::trace!("udbg: token={} continued at {:#x}", session.token(), rip);
}
