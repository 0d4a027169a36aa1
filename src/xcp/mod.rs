//----------------------------------------------------------------------------------------------
// Module xcp
//
// The XCP v1.0 master protocol engine (C4 in the design). A request/response state
// machine: CONNECT, GET_STATUS, PROGRAM_START, SET_MTA, PROGRAM_CLEAR, PROGRAM /
// PROGRAM_MAX, UPLOAD, PROGRAM_RESET. Byte order and packet sizes are negotiated once at
// CONNECT and held for the session; every command after that is bounded by its own
// timeout (T1..T7) and goes through the same request/poll/response primitive.

pub mod byteorder;
mod commands;

use crate::error::{Command, XcpError};
use crate::settings::{Settings, MAX_PACKET};
use crate::transport::Transport;
use log::{debug, info, trace, warn};

/// Session state, meaningful only while `connected` is true (§3 data model).
#[derive(Debug, Default)]
struct Session {
    connected: bool,
    slave_intel: bool,
    max_cto: usize,
    max_prog_cto: usize,
    max_dto: usize,
}

/// The XCP v1.0 master. Owns the transport exclusively for the lifetime of a session;
/// there is at most one in-flight request/response exchange at any time.
pub struct XcpMaster<T: Transport> {
    transport: T,
    settings: Settings,
    session: Session,
}

impl<T: Transport> XcpMaster<T> {
    pub fn new(transport: T, settings: Settings) -> Self {
        XcpMaster {
            transport,
            settings,
            session: Session::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.connected
    }

    /// Access to the underlying transport, for inspecting transport-side state (e.g. a
    /// test double's call counters) without exposing it through the session facade.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Max programmable payload per PROGRAM/PROGRAM_MAX packet, negotiated on
    /// PROGRAM_START. Only meaningful while connected.
    pub fn max_prog_cto(&self) -> usize {
        self.session.max_prog_cto
    }

    // One request/response exchange: transmit once, then poll the transport until a
    // response arrives or `timeout_ms` elapses. A non-0xFF or too-short response is a
    // protocol error, not a retryable condition.
    fn exchange(&mut self, request: &[u8], timeout_ms: u32, cmd: Command) -> Result<Vec<u8>, XcpError> {
        debug_assert!(crate::transport::assert_packet_len(request.len()), "request exceeds MAX_PACKET");
        trace!("{cmd}: tx {request:02X?}");
        self.transport.transmit_packet(request)?;
        let start = self.transport.now_ms();
        loop {
            if let Some(resp) = self.transport.try_receive_packet() {
                trace!("{cmd}: rx {resp:02X?}");
                if !commands::is_positive(&resp) {
                    return Err(XcpError::ProtocolError(cmd));
                }
                return Ok(resp);
            }
            if self.transport.now_ms().wrapping_sub(start) >= timeout_ms {
                return Err(XcpError::Timeout(cmd));
            }
        }
    }

    fn connect_once(&mut self) -> Result<(), XcpError> {
        let req = commands::connect_request(self.settings.connect_mode);
        let resp = self.exchange(&req, self.settings.timeout_t6, Command::Connect)?;
        let parsed = commands::parse_connect_response(&resp).ok_or(XcpError::ProtocolError(Command::Connect))?;
        if parsed.max_dto as usize > MAX_PACKET {
            return Err(XcpError::ProtocolError(Command::Connect));
        }
        if (parsed.max_cto as usize) < 2 {
            return Err(XcpError::ProtocolError(Command::Connect));
        }
        self.session.slave_intel = parsed.little_endian;
        self.session.max_cto = (parsed.max_cto as usize).min(MAX_PACKET);
        self.session.max_dto = (parsed.max_dto as usize).min(MAX_PACKET);
        self.session.connected = true;
        info!(
            "CONNECT ok: resource=0x{:02X} slave_intel={} max_cto={} max_dto={}",
            parsed.resource, self.session.slave_intel, self.session.max_cto, self.session.max_dto
        );
        Ok(())
    }

    fn get_status(&mut self) -> Result<commands::StatusResponse, XcpError> {
        let req = commands::get_status_request();
        let resp = self.exchange(&req, self.settings.timeout_t1, Command::GetStatus)?;
        commands::parse_get_status_response(&resp).ok_or(XcpError::ProtocolError(Command::GetStatus))
    }

    fn program_start(&mut self) -> Result<(), XcpError> {
        let req = commands::program_start_request();
        let resp = self.exchange(&req, self.settings.timeout_t3, Command::ProgramStart)?;
        let max_cto_pgm = commands::parse_program_start_response(&resp).ok_or(XcpError::ProtocolError(Command::ProgramStart))?;
        self.session.max_prog_cto = (max_cto_pgm as usize).min(MAX_PACKET);
        debug!("PROGRAM_START ok: max_prog_cto={}", self.session.max_prog_cto);
        Ok(())
    }

    /// Connect, query resource protection, unlock PGM if needed, enter programming mode.
    /// Retries CONNECT up to `settings.connect_retries` times; each attempt is bounded by
    /// T6 with no additional inter-attempt backoff.
    pub fn start(&mut self) -> Result<(), XcpError> {
        let mut last_err = XcpError::Timeout(Command::Connect);
        let mut connected = false;
        for attempt in 1..=self.settings.connect_retries {
            match self.connect_once() {
                Ok(()) => {
                    connected = true;
                    break;
                }
                Err(XcpError::Timeout(_)) => {
                    warn!("CONNECT attempt {attempt}/{} timed out, retrying", self.settings.connect_retries);
                    last_err = XcpError::Timeout(Command::Connect);
                }
                Err(e) => return Err(e),
            }
        }
        if !connected {
            return Err(last_err);
        }

        let status = self.get_status()?;
        if commands::resource_locked(status.protected_resources) {
            // GET_SEED/UNLOCK are outside this subset's command table (§4.3): the seed
            // itself is an external concern, obtained by the transport through whatever
            // side channel the deployment wires up. We only gate Start on whether a key
            // mechanism is present at all (DESIGN.md, open question resolution).
            if self.transport.compute_key(&[]).is_none() {
                self.session.connected = false;
                return Err(XcpError::Locked);
            }
        }

        self.program_start()?;
        Ok(())
    }

    /// Idempotent: calling `stop` from `Disconnected` or repeatedly is safe. Never
    /// propagates an error; cleanup failures are logged and swallowed.
    pub fn stop(&mut self) {
        if !self.session.connected {
            return;
        }
        if let Err(e) = self.program(&[]) {
            warn!("Stop: PROGRAM(0) failed: {e}");
        }
        let req = commands::program_reset_request();
        match self.exchange(&req, self.settings.timeout_t5, Command::ProgramReset) {
            Ok(_) => {}
            Err(XcpError::Timeout(_)) => debug!("PROGRAM_RESET: no response, treated as success"),
            Err(e) => warn!("Stop: PROGRAM_RESET failed: {e}"),
        }
        self.session = Session::default();
        info!("Stop: session closed");
    }

    pub fn set_mta(&mut self, address: u32) -> Result<(), XcpError> {
        self.require_connected()?;
        let req = commands::set_mta_request(address, self.session.slave_intel);
        self.exchange(&req, self.settings.timeout_t1, Command::SetMta)?;
        Ok(())
    }

    /// Erase `length` bytes starting at `address`. The slave aligns to its own hardware
    /// erase granularity; the master does not.
    pub fn clear(&mut self, address: u32, length: u32) -> Result<(), XcpError> {
        self.require_connected()?;
        self.set_mta(address)?;
        let req = commands::program_clear_request(length, self.session.slave_intel);
        self.exchange(&req, self.settings.timeout_t4, Command::ProgramClear)?;
        Ok(())
    }

    fn program(&mut self, data: &[u8]) -> Result<(), XcpError> {
        self.require_connected()?;
        if data.len() + 2 > self.session.max_prog_cto {
            return Err(XcpError::OutOfRange("PROGRAM payload exceeds max_prog_cto - 2"));
        }
        let req = commands::program_request(data);
        self.exchange(&req, self.settings.timeout_t5, Command::Program)?;
        Ok(())
    }

    fn program_max(&mut self, data: &[u8]) -> Result<(), XcpError> {
        self.require_connected()?;
        if data.len() != self.session.max_prog_cto - 1 {
            return Err(XcpError::OutOfRange("PROGRAM_MAX requires exactly max_prog_cto - 1 bytes"));
        }
        let req = commands::program_max_request(data);
        self.exchange(&req, self.settings.timeout_t5, Command::ProgramMax)?;
        Ok(())
    }

    /// Write `buffer` to `address`: SET_MTA then a burst of PROGRAM / PROGRAM_MAX
    /// packets. Runs of `max_prog_cto - 1` bytes use PROGRAM_MAX; the residual (which
    /// may be zero only when the whole buffer is empty) uses PROGRAM.
    pub fn write(&mut self, address: u32, buffer: &[u8]) -> Result<(), XcpError> {
        self.require_connected()?;
        self.set_mta(address)?;
        let p = self.session.max_prog_cto - 1;
        let mut remaining = buffer;
        loop {
            let r = remaining.len();
            if r == 0 {
                return Ok(());
            }
            let n = r % p;
            if n == 0 {
                let (chunk, rest) = remaining.split_at(p);
                self.program_max(chunk)?;
                remaining = rest;
            } else {
                let (chunk, rest) = remaining.split_at(n);
                self.program(chunk)?;
                remaining = rest;
            }
        }
    }

    /// Read `out.len()` bytes from `address`: SET_MTA then a burst of UPLOAD packets of
    /// up to `max_dto - 1` bytes each.
    pub fn read(&mut self, address: u32, out: &mut [u8]) -> Result<(), XcpError> {
        self.require_connected()?;
        self.set_mta(address)?;
        let step = self.session.max_dto - 1;
        let mut filled = 0;
        while filled < out.len() {
            let n = step.min(out.len() - filled);
            let req = commands::upload_request(n as u8);
            let resp = self.exchange(&req, self.settings.timeout_t1, Command::Upload)?;
            if resp.len() != n + 1 {
                return Err(XcpError::ProtocolError(Command::Upload));
            }
            out[filled..filled + n].copy_from_slice(&resp[1..]);
            filled += n;
        }
        Ok(())
    }

    fn require_connected(&self) -> Result<(), XcpError> {
        if self.session.connected {
            Ok(())
        } else {
            Err(XcpError::NotConnected)
        }
    }
}
