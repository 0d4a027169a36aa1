//----------------------------------------------------------------------------------------------
// xcp_flash
//
// Host-side firmware-update client for OpenBLT bootloader targets, programmed over XCP
// v1.0. Three collaborating pieces: an S-record firmware reader (`srecord`), an XCP v1.0
// master protocol engine (`xcp`), and an update orchestrator (`orchestrator`) that
// composes the two through a small session facade (`session`). The packet transport,
// the filesystem beneath the S-record reader, and the seed/key unlock computation are
// external collaborators the caller supplies (`transport::Transport`).

pub mod error;
pub mod orchestrator;
pub mod session;
pub mod settings;
pub mod srecord;
pub mod transport;
pub mod xcp;

pub use error::{Command, SRecordError, UpdateError, XcpError};
pub use orchestrator::run_update;
pub use session::ProgrammingSession;
pub use settings::Settings;
pub use srecord::{Chunk, Segment, SRecordReader};
pub use transport::Transport;
pub use xcp::XcpMaster;
