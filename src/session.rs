//----------------------------------------------------------------------------------------------
// Module session
//
// The session facade (C5): a uniform Start/Stop/Clear/Write/Read contract over whatever
// concrete protocol engine is plugged in underneath. Today there is exactly one
// implementation (the XCP v1.0 master), but the orchestrator is written against this
// trait rather than `XcpMaster` directly so a future protocol variant only has to
// implement the trait, not touch the orchestrator (§9 design notes: capability set over
// vtable-of-function-pointers).

use crate::error::XcpError;
use crate::transport::Transport;
use crate::xcp::XcpMaster;

/// The programming-session contract the orchestrator drives.
pub trait ProgrammingSession {
    /// Connect, unlock if needed, enter programming mode (§4.3 start procedure).
    fn start(&mut self) -> Result<(), XcpError>;

    /// Idempotent; never propagates an error (§4.3 stop procedure).
    fn stop(&mut self);

    /// Erase `length` bytes starting at `address`.
    fn clear(&mut self, address: u32, length: u32) -> Result<(), XcpError>;

    /// Write `buffer` to `address`, bursting into packet-sized commands.
    fn write(&mut self, address: u32, buffer: &[u8]) -> Result<(), XcpError>;

    /// Read `out.len()` bytes from `address`.
    fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), XcpError>;
}

impl<T: Transport> ProgrammingSession for XcpMaster<T> {
    fn start(&mut self) -> Result<(), XcpError> {
        XcpMaster::start(self)
    }

    fn stop(&mut self) {
        XcpMaster::stop(self)
    }

    fn clear(&mut self, address: u32, length: u32) -> Result<(), XcpError> {
        XcpMaster::clear(self, address, length)
    }

    fn write(&mut self, address: u32, buffer: &[u8]) -> Result<(), XcpError> {
        XcpMaster::write(self, address, buffer)
    }

    fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), XcpError> {
        XcpMaster::read(self, address, out)
    }
}
