//! Bounded instruction fetch for pause notifications.

/// Architectural maximum length of one x86 instruction.
pub const MAX_INSTRUCTION_LENGTH: usize = 15;

/// Size of the instruction byte buffer in a pause packet.
pub const INSTRUCTION_BUFFER_SIZE: usize = 16;

pub const PAGE_SIZE: usize = 4096;

/// Largest number of bytes at `rip` that can be read without leaving its page.
///
/// The next page may be unmapped or belong to something else, so the read
/// stops at the boundary even if the instruction continues past it.
pub fn safe_read_length(rip: u64) -> usize {
    let page_offset = (rip as usize) & (PAGE_SIZE - 1);
    core::cmp::min(MAX_INSTRUCTION_LENGTH, PAGE_SIZE - page_offset)
}

/// Number of instruction bytes to fetch for a trap at `rip`.
///
/// A non-zero `hint` comes from a previous decode and is trusted, clamped to
/// the instruction buffer.
pub fn fetch_length(rip: u64, hint: u32) -> usize {
    if hint != 0 {
        (hint as usize).min(MAX_INSTRUCTION_LENGTH)
    } else {
        safe_read_length(rip)
    }
}
