//----------------------------------------------------------------------------------------------
// Module transport
//
// The capability set the XCP master requires of its host (§4.1 of the design). The core
// never blocks on a response itself: it transmits once, then polls `try_receive_packet`
// against its own clock until a response arrives or the command's timeout elapses.

use crate::settings::MAX_PACKET;

/// One XCP packet: a byte sequence of at most `MAX_PACKET` bytes. Callers are expected
/// to keep packets on the stack; `Vec<u8>` is used here only because transports are
/// free to build packets however is convenient for them.
pub type Packet = Vec<u8>;

/// The four capabilities the XCP master consumes from its host. Implemented once per
/// concrete transport (CAN, serial, UDP, an in-process loopback for tests, ...).
pub trait Transport {
    /// Monotonic wall time in milliseconds. Must be overflow-safe on 32-bit subtraction;
    /// callers compare elapsed time as `now.wrapping_sub(start)`.
    fn now_ms(&self) -> u32;

    /// Hand one packet to the transport. May block briefly on bus arbitration but must
    /// never block waiting for a response.
    fn transmit_packet(&mut self, packet: &[u8]) -> std::io::Result<()>;

    /// Non-blocking: returns the next complete response packet if one is available.
    fn try_receive_packet(&mut self) -> Option<Packet>;

    /// Invoked at most once per `Start`, only when the slave reports the PGM resource
    /// locked. Transports without a seed/key mechanism wired should return `None`.
    fn compute_key(&mut self, _seed: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

pub(crate) fn assert_packet_len(len: usize) -> bool {
    len <= MAX_PACKET
}

pub mod loopback;
#[cfg(feature = "udp")]
pub mod udp;
