//----------------------------------------------------------------------------------------------
// Module transport::loopback
//
// An in-process transport backed by a response queue, driving an in-memory model slave.
// Used by the end-to-end test scenarios (§8); not wired into the CLI front-end.

use super::{Packet, Transport};
use crate::xcp::byteorder::get_u32;
use std::collections::VecDeque;

const CC_CONNECT: u8 = 0xFF;
const CC_GET_STATUS: u8 = 0xFD;
const CC_PROGRAM_START: u8 = 0xD2;
const CC_SET_MTA: u8 = 0xF6;
const CC_PROGRAM_CLEAR: u8 = 0xD1;
const CC_PROGRAM: u8 = 0xD0;
const CC_PROGRAM_MAX: u8 = 0xC9;
const CC_UPLOAD: u8 = 0xF5;
const CC_PROGRAM_RESET: u8 = 0xCF;

/// A minimal XCP slave that keeps a flat byte-addressable memory image, for exercising
/// the master end to end without real hardware.
pub struct ModelSlave {
    memory: std::collections::HashMap<u32, u8>,
    mta: u32,
    max_cto: u8,
    max_dto: u16,
    max_prog_cto: u8,
    little_endian: bool,
    pgm_locked: bool,
    reset_count: u32,
}

impl ModelSlave {
    pub fn new() -> Self {
        ModelSlave {
            memory: std::collections::HashMap::new(),
            mta: 0,
            max_cto: 64,
            max_dto: 64,
            max_prog_cto: 64,
            little_endian: true,
            pgm_locked: false,
            reset_count: 0,
        }
    }

    pub fn with_max_prog_cto(mut self, max_prog_cto: u8) -> Self {
        self.max_prog_cto = max_prog_cto;
        self
    }

    pub fn with_max_cto(mut self, max_cto: u8) -> Self {
        self.max_cto = max_cto;
        self
    }

    pub fn with_max_dto(mut self, max_dto: u16) -> Self {
        self.max_dto = max_dto;
        self
    }

    pub fn with_pgm_locked(mut self, locked: bool) -> Self {
        self.pgm_locked = locked;
        self
    }

    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }

    pub fn read_memory(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len as u32).map(|i| *self.memory.get(&(address + i)).unwrap_or(&0)).collect()
    }

    fn handle(&mut self, req: &[u8]) -> Option<Vec<u8>> {
        if req.is_empty() {
            return None;
        }
        match req[0] {
            CC_CONNECT => {
                let comm_mode = if self.little_endian { 0 } else { 1 };
                let resource = if self.pgm_locked { 0x10 } else { 0x00 };
                let mut resp = vec![0xFF, resource, comm_mode, self.max_cto, 0, 0, 0x10, 0x00];
                resp[4] = (self.max_dto & 0xFF) as u8;
                resp[5] = (self.max_dto >> 8) as u8;
                Some(resp)
            }
            CC_GET_STATUS => Some(vec![0xFF, 0x00, if self.pgm_locked { 0x10 } else { 0x00 }, 0, 0, 0]),
            CC_PROGRAM_START => Some(vec![0xFF, 0, 0, self.max_prog_cto, 0, 0, 0]),
            CC_SET_MTA => {
                if req.len() != 8 {
                    return Some(vec![0xFE, 0x21]);
                }
                self.mta = get_u32(&req[4..8], self.little_endian);
                Some(vec![0xFF])
            }
            CC_PROGRAM_CLEAR => {
                if req.len() != 8 {
                    return Some(vec![0xFE, 0x21]);
                }
                let len = get_u32(&req[4..8], self.little_endian);
                for i in 0..len {
                    self.memory.remove(&(self.mta + i));
                }
                Some(vec![0xFF])
            }
            CC_PROGRAM => {
                if req.len() < 2 {
                    return Some(vec![0xFE, 0x21]);
                }
                let n = req[1] as usize;
                if req.len() != 2 + n {
                    return Some(vec![0xFE, 0x21]);
                }
                for (i, b) in req[2..].iter().enumerate() {
                    self.memory.insert(self.mta + i as u32, *b);
                }
                self.mta += n as u32;
                Some(vec![0xFF])
            }
            CC_PROGRAM_MAX => {
                let data = &req[1..];
                for (i, b) in data.iter().enumerate() {
                    self.memory.insert(self.mta + i as u32, *b);
                }
                self.mta += data.len() as u32;
                Some(vec![0xFF])
            }
            CC_UPLOAD => {
                let n = req[1] as usize;
                let mut resp = vec![0xFFu8];
                resp.extend(self.read_memory(self.mta, n));
                self.mta += n as u32;
                Some(resp)
            }
            CC_PROGRAM_RESET => {
                self.reset_count += 1;
                Some(vec![0xFF])
            }
            _ => Some(vec![0xFE, 0x20]),
        }
    }
}

impl Default for ModelSlave {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-attempt drop schedule: the first `drop_count` CONNECT requests receive no
/// response at all, used to exercise the master's retry loop (scenario 4, §8).
pub struct LoopbackTransport {
    slave: ModelSlave,
    clock_ms: u32,
    inflight: VecDeque<Packet>,
    connect_drops_remaining: u32,
    program_clear_drops_remaining: u32,
    transmit_count: u32,
    seed_key: Option<Vec<u8>>,
}

impl LoopbackTransport {
    pub fn new(slave: ModelSlave) -> Self {
        LoopbackTransport {
            slave,
            clock_ms: 0,
            inflight: VecDeque::new(),
            connect_drops_remaining: 0,
            program_clear_drops_remaining: 0,
            transmit_count: 0,
            seed_key: None,
        }
    }

    /// Drop the first `n` CONNECT requests (no response queued); used to test retries.
    pub fn drop_first_connects(mut self, n: u32) -> Self {
        self.connect_drops_remaining = n;
        self
    }

    /// Drop the next `n` PROGRAM_CLEAR requests (no response queued); used to test the
    /// mid-programming timeout path (scenario 6, §8).
    pub fn drop_next_program_clears(mut self, n: u32) -> Self {
        self.program_clear_drops_remaining = n;
        self
    }

    pub fn with_seed_key(mut self, key: Vec<u8>) -> Self {
        self.seed_key = Some(key);
        self
    }

    pub fn transmit_count(&self) -> u32 {
        self.transmit_count
    }

    pub fn slave(&self) -> &ModelSlave {
        &self.slave
    }
}

impl Transport for LoopbackTransport {
    fn now_ms(&self) -> u32 {
        self.clock_ms
    }

    fn transmit_packet(&mut self, packet: &[u8]) -> std::io::Result<()> {
        self.transmit_count += 1;
        if packet.first() == Some(&CC_CONNECT) && self.connect_drops_remaining > 0 {
            self.connect_drops_remaining -= 1;
            return Ok(());
        }
        if packet.first() == Some(&CC_PROGRAM_CLEAR) && self.program_clear_drops_remaining > 0 {
            self.program_clear_drops_remaining -= 1;
            return Ok(());
        }
        if let Some(resp) = self.slave.handle(packet) {
            self.inflight.push_back(resp);
        }
        Ok(())
    }

    fn try_receive_packet(&mut self) -> Option<Packet> {
        // Simulate a busy-wait transport: each unsuccessful poll consumes a tick of
        // simulated time, so a dropped response eventually trips the caller's timeout
        // without an actual sleep.
        match self.inflight.pop_front() {
            Some(resp) => Some(resp),
            None => {
                self.clock_ms = self.clock_ms.wrapping_add(1);
                None
            }
        }
    }

    fn compute_key(&mut self, _seed: &[u8]) -> Option<Vec<u8>> {
        self.seed_key.clone()
    }
}
