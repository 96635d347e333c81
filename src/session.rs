//! Per-thread debugging session.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use crate::mailbox::Mailbox;
use crate::token::Token;

const NO_OWNER: u32 = u32::MAX;

/// Debugging state of one tracked guest thread.
///
/// Shared between the registry and whichever processor is handling the
/// thread's exit. The register fields are only written by the processor that
/// owns the current exit of this thread.
pub struct ThreadDebuggingSession {
    token: Token,
    process_id: u32,
    thread_id: u32,
    /// Guest address of the spin loop the thread is parked on.
    spin_region: u64,
    is_paused: AtomicBool,
    saved_rip: AtomicU64,
    saved_rsp: AtomicU64,
    paused_at_ns: AtomicU64,
    owner_cpu: AtomicU32,
    mailbox: Mailbox,
}

impl ThreadDebuggingSession {
    pub(crate) fn new(token: Token, process_id: u32, thread_id: u32, spin_region: u64) -> Self {
        Self {
            token,
            process_id,
            thread_id,
            spin_region,
            is_paused: AtomicBool::new(false),
            saved_rip: AtomicU64::new(0),
            saved_rsp: AtomicU64::new(0),
            paused_at_ns: AtomicU64::new(0),
            owner_cpu: AtomicU32::new(NO_OWNER),
            mailbox: Mailbox::new(),
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn spin_region(&self) -> u64 {
        self.spin_region
    }

    pub fn is_paused(&self) -> bool {
        self.is_paused.load(Ordering::Acquire)
    }

    /// `(rip, rsp)` saved by the last pause.
    pub fn saved_context(&self) -> (u64, u64) {
        (
            self.saved_rip.load(Ordering::Relaxed),
            self.saved_rsp.load(Ordering::Relaxed),
        )
    }

    pub fn paused_at_ns(&self) -> u64 {
        self.paused_at_ns.load(Ordering::Relaxed)
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub(crate) fn save_context(&self, rip: u64, rsp: u64, now_ns: u64) {
        self.saved_rip.store(rip, Ordering::Relaxed);
        self.saved_rsp.store(rsp, Ordering::Relaxed);
        self.paused_at_ns.store(now_ns, Ordering::Relaxed);
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.is_paused.store(paused, Ordering::Release);
    }

    /// Mark `cpu` as the processor servicing this thread's exit.
    ///
    /// A thread runs on one processor at a time, so a second concurrent owner
    /// means the caller broke the ownership rule. Checked in debug builds only.
    pub(crate) fn claim(&self, cpu: u32) -> OwnerGuard<'_> {
        let prev = self.owner_cpu.swap(cpu, Ordering::AcqRel);
        debug_assert!(
            prev == NO_OWNER || prev == cpu,
            "session {} serviced by cpu {} while owned by cpu {}",
            self.token,
            cpu,
            prev
        );
        OwnerGuard { session: self }
    }

    /// Processor currently servicing this thread, if any.
    pub fn owner_cpu(&self) -> Option<u32> {
        let cpu = self.owner_cpu.load(Ordering::Acquire);
        (cpu != NO_OWNER).then_some(cpu)
    }
}

/// Releases the processor claim on drop.
pub(crate) struct OwnerGuard<'a> {
    session: &'a ThreadDebuggingSession,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.session.owner_cpu.store(NO_OWNER, Ordering::Release);
    }
}

/// Snapshot of a session for status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    pub token: Token,
    pub process_id: u32,
    pub thread_id: u32,
    pub is_paused: bool,
    pub saved_rip: u64,
    /// Monotonic time of the last pause.
    pub paused_at_ns: u64,
    pub pending_actions: usize,
}

impl From<&ThreadDebuggingSession> for SessionInfo {
    fn from(s: &ThreadDebuggingSession) -> Self {
        Self {
            token: s.token,
            process_id: s.process_id,
            thread_id: s.thread_id,
            is_paused: s.is_paused(),
            saved_rip: s.saved_context().0,
            paused_at_ns: s.paused_at_ns(),
            pending_actions: s.mailbox.pending(),
        }
    }
}
