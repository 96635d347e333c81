//! Integration tests for the #DB/#BP exit handler.
//!
//! Tests state capture, the pause notification, instruction fetch bounds
//! and the pause/resume round trip.

mod common;

use std::sync::atomic::Ordering;

use axudbg::regs::rflags;
use axudbg::{
    CommandPacket, PausingReason, PendingAction, Token, TrapResult, UserDebugger,
    spin_region::SPIN_LOOP_CODE,
};
use common::{MockExit, MockOps, SPIN_REGION, active_debugger};

const CODE_BASE: u64 = 0x0040_0000;
const RSP: u64 = 0x0014_fe00;

/// Two pages of guest code; byte `i` holds `i as u8`.
fn code_ops() -> MockOps {
    let code: Vec<u8> = (0..0x2000usize).map(|i| i as u8).collect();
    MockOps::with_memory(CODE_BASE, code)
}

fn trap(udbg: &UserDebugger<MockOps>, exit: &mut MockExit) -> TrapResult {
    udbg.handle_breakpoint_and_debug_exception(exit, PausingReason::SoftwareBreakpoint, None)
}

// =============================================================================
// Filtering Tests
// =============================================================================

#[test]
fn test_untracked_thread_not_paused() {
    let udbg = active_debugger(code_ops());
    udbg.attach_thread(10, 20, SPIN_REGION).unwrap();

    let mut exit = MockExit::new(10, 21, CODE_BASE + 0x100, RSP);
    assert_eq!(trap(&udbg, &mut exit), TrapResult::NotTracked);
    assert_eq!(exit.rip, CODE_BASE + 0x100);
    assert!(exit.increment_rip);
    assert!(udbg.ops().sent_packets().is_empty());
}

#[test]
fn test_inactive_debugger_not_paused() {
    let udbg = UserDebugger::new(Default::default(), code_ops());
    let mut exit = MockExit::new(10, 20, CODE_BASE + 0x100, RSP);
    assert_eq!(trap(&udbg, &mut exit), TrapResult::NotTracked);
    assert!(udbg.ops().sent_packets().is_empty());
}

#[test]
fn test_non_root_mode_rejected() {
    let udbg = active_debugger(code_ops());
    let token = udbg.attach_thread(10, 20, SPIN_REGION).unwrap();

    let mut exit = MockExit::new(10, 20, CODE_BASE + 0x100, RSP);
    exit.root_mode = false;
    assert_eq!(trap(&udbg, &mut exit), TrapResult::NotRootMode);
    assert_eq!(exit.rip, CODE_BASE + 0x100);
    assert!(!udbg.find_by_token(token).unwrap().is_paused());
    assert!(udbg.ops().sent_packets().is_empty());
}

// =============================================================================
// Notification Tests
// =============================================================================

#[test]
fn test_pause_packet_contents() {
    let udbg = active_debugger(code_ops());
    let token = udbg.attach_thread(10, 20, SPIN_REGION).unwrap();

    let rip = CODE_BASE + 0x100;
    let mut exit = MockExit::new(10, 20, rip, RSP);
    exit.rflags = rflags::RESERVED_1 | rflags::IF | rflags::ZF | rflags::PF;
    exit.user_32bit = true;
    exit.regs.rcx = 0xc0ffee;

    let res = udbg.handle_breakpoint_and_debug_exception(
        &mut exit,
        PausingReason::EventTriggered,
        Some(0x77),
    );
    assert_eq!(res, TrapResult::Paused(token));

    let sent = udbg.ops().sent_packets();
    assert_eq!(sent.len(), 1);
    let packet = &sent[0];
    assert_eq!(packet.token(), token);
    assert_eq!(packet.rip, rip);
    assert_eq!(packet.rflags, 0x246);
    assert_ne!(packet.rflags & rflags::ZF, 0);
    assert_eq!(packet.rflags & (rflags::TF | rflags::CF), 0);
    assert_eq!(packet.is_32bit_address, 1);
    assert_eq!(packet.event_tag(), Some(0x77));
    assert_eq!(packet.reason(), Some(PausingReason::EventTriggered));
    assert_eq!(packet.process_id, 10);
    assert_eq!(packet.thread_id, 20);
    assert_eq!(packet.guest_regs, exit.regs);

    let expected: Vec<u8> = (0x100..0x10f).map(|i| i as u8).collect();
    assert_eq!(packet.read_instruction_len, 15);
    assert_eq!(packet.instruction(), &expected[..]);
    assert_eq!(packet.as_bytes().len(), 200);
}

#[test]
fn test_no_event_tag() {
    let udbg = active_debugger(code_ops());
    udbg.attach_thread(10, 20, SPIN_REGION).unwrap();

    let mut exit = MockExit::new(10, 20, CODE_BASE, RSP);
    trap(&udbg, &mut exit);
    let packet = udbg.ops().sent_packets()[0];
    assert_eq!(packet.event_tag(), None);
    assert_eq!(packet.is_32bit_address, 0);
}

#[test]
fn test_read_stops_at_page_boundary() {
    for offset in 0xff8u64..=0xfff {
        let udbg = active_debugger(code_ops());
        udbg.attach_thread(10, 20, SPIN_REGION).unwrap();

        let rip = CODE_BASE + offset;
        let mut exit = MockExit::new(10, 20, rip, RSP);
        trap(&udbg, &mut exit);

        let reads = udbg.ops().reads.lock().unwrap().clone();
        assert_eq!(reads.len(), 1);
        let (gva, len) = reads[0];
        assert_eq!(gva, rip);
        assert_eq!(len as u64, 0x1000 - offset);

        let packet = udbg.ops().sent_packets()[0];
        assert_eq!(packet.read_instruction_len as u64, 0x1000 - offset);
    }
}

#[test]
fn test_length_hint_used() {
    let udbg = active_debugger(code_ops());
    udbg.attach_thread(10, 20, SPIN_REGION).unwrap();

    let mut exit = MockExit::new(10, 20, CODE_BASE + 0xffe, RSP);
    exit.insn_len_hint = 4;
    trap(&udbg, &mut exit);

    assert_eq!(udbg.ops().reads.lock().unwrap()[0], (CODE_BASE + 0xffe, 4));
    assert_eq!(udbg.ops().sent_packets()[0].instruction(), &[0xfe, 0xff, 0x00, 0x01]);
}

#[test]
fn test_unreadable_rip_still_pauses() {
    let udbg = active_debugger(code_ops());
    let token = udbg.attach_thread(10, 20, SPIN_REGION).unwrap();

    let mut exit = MockExit::new(10, 20, 0xdead_0000, RSP);
    assert_eq!(trap(&udbg, &mut exit), TrapResult::Paused(token));

    let packet = udbg.ops().sent_packets()[0];
    assert_eq!(packet.read_instruction_len, 0);
    assert!(packet.instruction().is_empty());
    assert_eq!(exit.rip, SPIN_REGION);
}

#[test]
fn test_send_failure_still_pauses() {
    let udbg = active_debugger(code_ops());
    let token = udbg.attach_thread(10, 20, SPIN_REGION).unwrap();
    udbg.ops().fail_send.store(true, Ordering::SeqCst);

    let mut exit = MockExit::new(10, 20, CODE_BASE, RSP);
    assert_eq!(trap(&udbg, &mut exit), TrapResult::Paused(token));
    assert!(udbg.find_by_token(token).unwrap().is_paused());
    assert_eq!(exit.rip, SPIN_REGION);
    assert!(udbg.ops().sent_packets().is_empty());
}

// =============================================================================
// Pause / Resume Tests
// =============================================================================

#[test]
fn test_pause_resume_round_trip() {
    let udbg = active_debugger(code_ops());
    let token = udbg.attach_thread(10, 20, SPIN_REGION).unwrap();
    let session = udbg.find_by_token(token).unwrap();

    let rip = CODE_BASE + 0x234;
    let mut exit = MockExit::new(10, 20, rip, RSP);
    trap(&udbg, &mut exit);

    assert!(session.is_paused());
    assert_eq!(session.saved_context(), (rip, RSP));
    assert_ne!(session.paused_at_ns(), 0);
    assert_eq!(udbg.list_sessions()[0].paused_at_ns, session.paused_at_ns());
    assert_eq!(exit.rip, SPIN_REGION);
    assert!(!exit.increment_rip);

    // The spin loop may move the stack pointer; resume must not care.
    exit.rip = SPIN_REGION + 1;
    exit.rsp = RSP - 0x40;
    exit.increment_rip = true;
    udbg.dispatch_command(&CommandPacket::new(token, PendingAction::continue_thread()))
        .unwrap();
    assert!(udbg.check_for_command(&mut exit));

    assert!(!session.is_paused());
    assert_eq!(exit.rip, rip);
    assert_eq!(exit.rsp, RSP);
    assert!(!exit.increment_rip);
}

#[test]
fn test_second_trap_keeps_saved_context() {
    let udbg = active_debugger(code_ops());
    let token = udbg.attach_thread(10, 20, SPIN_REGION).unwrap();

    let rip = CODE_BASE + 0x10;
    let mut exit = MockExit::new(10, 20, rip, RSP);
    trap(&udbg, &mut exit);

    // A #DB raised inside the spin loop itself.
    exit.rip = SPIN_REGION + 3;
    trap(&udbg, &mut exit);

    let session = udbg.find_by_token(token).unwrap();
    assert_eq!(session.saved_context(), (rip, RSP));
    assert_eq!(exit.rip, SPIN_REGION);
    assert_eq!(udbg.ops().sent_packets().len(), 2);
}

#[test]
fn test_owner_released_after_exit() {
    let udbg = active_debugger(code_ops());
    let token = udbg.attach_thread(10, 20, SPIN_REGION).unwrap();

    let mut exit = MockExit::new(10, 20, CODE_BASE, RSP);
    trap(&udbg, &mut exit);
    assert_eq!(udbg.find_by_token(token).unwrap().owner_cpu(), None);
}

// =============================================================================
// End-to-End Tests
// =============================================================================

#[test]
fn test_breakpoint_to_continue_scenario() {
    let udbg = active_debugger(code_ops());
    let token = udbg.attach_thread(10, 20, SPIN_REGION).unwrap();
    assert_ne!(token, Token::NULL);
    assert_eq!(SPIN_LOOP_CODE[1..3], [0x0f, 0xa2]);

    // Guest thread hits int3.
    let rip = CODE_BASE + 0x500;
    let mut exit = MockExit::new(10, 20, rip, RSP);
    assert_eq!(trap(&udbg, &mut exit), TrapResult::Paused(token));
    assert_eq!(udbg.ops().sent_packets()[0].token(), token);

    // Spinning without a command leaves the thread parked.
    exit.rip = SPIN_REGION + 1;
    assert!(udbg.check_for_command(&mut exit));
    assert_eq!(exit.rip, SPIN_REGION + 1);

    // Controller continues the thread.
    udbg.dispatch_command(&CommandPacket::new(token, PendingAction::continue_thread()))
        .unwrap();
    assert!(udbg.check_for_command(&mut exit));
    assert_eq!(exit.rip, rip);
    assert_eq!(exit.rsp, RSP);

    // Back in guest code, CPUID is ordinary again.
    assert!(!udbg.check_for_command(&mut exit));

    let info = udbg.list_sessions();
    assert_eq!(info.len(), 1);
    assert!(!info[0].is_paused);
    assert_eq!(info[0].saved_rip, rip);
    assert_eq!(info[0].pending_actions, 0);
}
