//----------------------------------------------------------------------------------------------
// Module transport::udp
//
// A reference host transport for manual interop testing against a real or simulated XCP
// slave process on the host network. Mirrors the teacher's own UDP-based XCP test client
// in spirit, but stays synchronous end to end: no tokio, no spawned receive task. A
// non-blocking socket plus `try_recv` is enough to satisfy the transport contract (§4.1).

use super::{Packet, Transport};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Instant;

pub struct UdpTransport {
    socket: UdpSocket,
    dest: SocketAddr,
    start: Instant,
    recv_buf: [u8; 512],
}

impl UdpTransport {
    pub fn bind(bind_addr: SocketAddr, dest: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(UdpTransport {
            socket,
            dest,
            start: Instant::now(),
            recv_buf: [0; 512],
        })
    }
}

impl Transport for UdpTransport {
    fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    fn transmit_packet(&mut self, packet: &[u8]) -> std::io::Result<()> {
        self.socket.send_to(packet, self.dest)?;
        Ok(())
    }

    fn try_receive_packet(&mut self) -> Option<Packet> {
        match self.socket.recv_from(&mut self.recv_buf) {
            Ok((len, _src)) => Some(self.recv_buf[..len].to_vec()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(_) => None,
        }
    }
}
