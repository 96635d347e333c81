//! Code placed in the per-thread reserved buffer.
//!
//! The attach side allocates a small executable buffer in the debuggee and
//! copies [`SPIN_LOOP_CODE`] into it; its address becomes the session's spin
//! region.

/// `nop; cpuid; jmp short -5`
///
/// The CPUID exits unconditionally under VMX. While the thread is paused the
/// hypervisor neither emulates it nor touches guest registers, so the loop has
/// no visible effect on the thread's state.
pub const SPIN_LOOP_CODE: [u8; 5] = [0x90, 0x0f, 0xa2, 0xeb, 0xfb];

/// Whether `rip` lies inside a spin loop starting at `base`.
pub fn is_in_spin_loop(base: u64, rip: u64) -> bool {
    rip.wrapping_sub(base) < SPIN_LOOP_CODE.len() as u64
}
