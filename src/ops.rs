//! Glue to the rest of the hypervisor.
//!
//! The debugger never touches guest memory, the transport, or other processors
//! directly. Those services are supplied by the embedding VMM through [`UdOps`].

use axerrno::AxResult;

use crate::packet::PausePacket;

/// Services the debugging engine consumes from the hypervisor.
pub trait UdOps {
    /// Copy guest memory of the current process at `gva` into `buf`.
    ///
    /// Must tolerate unmapped or invalid ranges without faulting the caller.
    /// Returns the number of bytes copied, which may be short.
    fn read_guest_memory_safe(&self, gva: u64, buf: &mut [u8]) -> AxResult<usize>;

    /// Queue a pause notification for the controller.
    ///
    /// One way and non-blocking. An error means the record was dropped.
    fn send_pause_notification(&self, packet: &PausePacket) -> AxResult<()>;

    /// Enable VM-exits on #DB and #BP on every logical processor.
    ///
    /// Returns once every processor has updated its exception bitmap.
    fn enable_db_bp_exiting_all_cores(&self);
}
