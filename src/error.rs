//----------------------------------------------------------------------------------------------
// Module error

use thiserror::Error;

/// XCP command identity, attached to `Timeout` and `ProtocolError` so a caller can tell
/// which exchange in a multi-command operation (e.g. `Write`) actually failed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Command {
    Connect,
    GetStatus,
    ProgramStart,
    SetMta,
    ProgramClear,
    Program,
    ProgramMax,
    Upload,
    ProgramReset,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Command::Connect => "CONNECT",
            Command::GetStatus => "GET_STATUS",
            Command::ProgramStart => "PROGRAM_START",
            Command::SetMta => "SET_MTA",
            Command::ProgramClear => "PROGRAM_CLEAR",
            Command::Program => "PROGRAM",
            Command::ProgramMax => "PROGRAM_MAX",
            Command::Upload => "UPLOAD",
            Command::ProgramReset => "PROGRAM_RESET",
        };
        write!(f, "{name}")
    }
}

/// Errors raised while parsing an S-record firmware file.
#[derive(Error, Debug)]
pub enum SRecordError {
    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error("malformed S-record line: {0}")]
    BadLine(String),

    #[error("S-record checksum mismatch at offset {offset}")]
    BadChecksum { offset: u64 },
}

/// Errors raised by the XCP v1.0 master protocol engine.
#[derive(Error, Debug)]
pub enum XcpError {
    #[error("transport error")]
    Transport(#[from] std::io::Error),

    #[error("{0}: response timed out")]
    Timeout(Command),

    #[error("{0}: malformed or negative response")]
    ProtocolError(Command),

    #[error("slave's PGM resource is locked and no seed/key mechanism is wired")]
    Locked,

    #[error("operation out of range: {0}")]
    OutOfRange(&'static str),

    #[error("operation requires an active XCP session")]
    NotConnected,
}

/// Errors raised by the update orchestrator, wrapping the lower layers rather than
/// re-stating their causes as strings.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("firmware file error")]
    Firmware(#[from] SRecordError),

    #[error("XCP protocol error")]
    Xcp(#[from] XcpError),
}
