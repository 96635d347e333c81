//! Mock hypervisor glue shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axerrno::AxResult;
use axudbg::{GuestRegisters, PausePacket, UdConfig, UdOps, UserDebugger, VmExitContext};

pub const SPIN_REGION: u64 = 0x0000_7ff0_0000_0000;

/// Mock VM-exit state of one guest thread.
#[derive(Debug, Clone)]
pub struct MockExit {
    pub root_mode: bool,
    pub rip: u64,
    pub rsp: u64,
    pub rflags: u64,
    pub insn_len_hint: u32,
    pub user_32bit: bool,
    pub regs: GuestRegisters,
    pub increment_rip: bool,
    pub process_id: u32,
    pub thread_id: u32,
}

impl MockExit {
    pub fn new(process_id: u32, thread_id: u32, rip: u64, rsp: u64) -> Self {
        Self {
            root_mode: true,
            rip,
            rsp,
            rflags: 0x202,
            insn_len_hint: 0,
            user_32bit: false,
            regs: GuestRegisters {
                rax: 0x1111,
                rbx: 0x2222,
                rsp,
                ..Default::default()
            },
            increment_rip: true,
            process_id,
            thread_id,
        }
    }
}

impl VmExitContext for MockExit {
    fn is_root_mode(&self) -> bool {
        self.root_mode
    }

    fn guest_rip(&self) -> u64 {
        self.rip
    }

    fn set_guest_rip(&mut self, rip: u64) {
        self.rip = rip;
    }

    fn guest_rsp(&self) -> u64 {
        self.rsp
    }

    fn set_guest_rsp(&mut self, rsp: u64) {
        self.rsp = rsp;
    }

    fn guest_rflags(&self) -> u64 {
        self.rflags
    }

    fn instruction_length_hint(&self) -> u32 {
        self.insn_len_hint
    }

    fn is_guest_user_mode_32bit(&self) -> bool {
        self.user_32bit
    }

    fn guest_registers(&self) -> &GuestRegisters {
        &self.regs
    }

    fn set_increment_rip(&mut self, increment: bool) {
        self.increment_rip = increment;
    }

    fn current_process_id(&self) -> u32 {
        self.process_id
    }

    fn current_thread_id(&self) -> u32 {
        self.thread_id
    }
}

/// Mock hypervisor services: one mapped guest region, a packet log and
/// counters.
pub struct MockOps {
    pub memory_base: u64,
    pub memory: Vec<u8>,
    pub sent: Mutex<Vec<PausePacket>>,
    pub fail_send: AtomicBool,
    pub broadcasts: AtomicUsize,
    pub reads: Mutex<Vec<(u64, usize)>>,
}

impl MockOps {
    pub fn new() -> Self {
        Self::with_memory(0, Vec::new())
    }

    pub fn with_memory(memory_base: u64, memory: Vec<u8>) -> Self {
        Self {
            memory_base,
            memory,
            sent: Mutex::new(Vec::new()),
            fail_send: AtomicBool::new(false),
            broadcasts: AtomicUsize::new(0),
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_packets(&self) -> Vec<PausePacket> {
        self.sent.lock().unwrap().clone()
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.load(Ordering::SeqCst)
    }
}

impl UdOps for MockOps {
    fn read_guest_memory_safe(&self, gva: u64, buf: &mut [u8]) -> AxResult<usize> {
        self.reads.lock().unwrap().push((gva, buf.len()));

        let end = self.memory_base + self.memory.len() as u64;
        if gva < self.memory_base || gva >= end {
            return axerrno::ax_err!(NotFound, "unmapped guest address");
        }
        let start = (gva - self.memory_base) as usize;
        let n = buf.len().min(self.memory.len() - start);
        buf[..n].copy_from_slice(&self.memory[start..start + n]);
        Ok(n)
    }

    fn send_pause_notification(&self, packet: &PausePacket) -> AxResult<()> {
        if self.fail_send.load(Ordering::SeqCst) {
            return axerrno::ax_err!(Unsupported, "transport down");
        }
        self.sent.lock().unwrap().push(*packet);
        Ok(())
    }

    fn enable_db_bp_exiting_all_cores(&self) {
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
    }
}

/// An active debugger over `ops`.
pub fn active_debugger(ops: MockOps) -> UserDebugger<MockOps> {
    let udbg = UserDebugger::new(UdConfig::default(), ops);
    udbg.activate().unwrap();
    udbg
}
