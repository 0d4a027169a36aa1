//----------------------------------------------------------------------------------------------
// Module settings
//
// The configuration surface presented to the embedding application. Mirrors
// `tXcpLoaderSettings` from the original loader plus the two constants
// (`CONNECT_RETRIES`, `MAX_PACKET`) that the source hard-coded.

/// Upper bound on any XCP packet length (master->slave or slave->master).
pub const MAX_PACKET: usize = 255;

/// Maximum bytes a single `NextChunk` call emits.
pub const CHUNK_MAX: usize = 512;

/// Number of CONNECT attempts before `Start` gives up.
pub const CONNECT_RETRIES: u32 = 5;

/// The seven XCP protocol timeouts plus the connect mode byte.
///
/// Field names follow the original loader's T1..T7 numbering so the mapping
/// to the wire-level command table is traceable at a glance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    /// T1: command response timeout (ms). Covers GET_STATUS, SET_MTA, UPLOAD.
    pub timeout_t1: u32,
    /// T3: PROGRAM_START response timeout (ms).
    pub timeout_t3: u32,
    /// T4: PROGRAM_CLEAR response timeout (ms).
    pub timeout_t4: u32,
    /// T5: PROGRAM / PROGRAM_MAX / PROGRAM_RESET response timeout (ms).
    pub timeout_t5: u32,
    /// T6: CONNECT response timeout (ms).
    pub timeout_t6: u32,
    /// T7: busy-wait timeout (ms), reserved for slave-side busy responses.
    pub timeout_t7: u32,
    /// XCP CONNECT mode byte (slave-specific, e.g. a node id).
    pub connect_mode: u8,
    /// Number of CONNECT attempts before `Start` gives up.
    pub connect_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            timeout_t1: 1000,
            timeout_t3: 2000,
            timeout_t4: 10000,
            timeout_t5: 1000,
            timeout_t6: 50,
            timeout_t7: 2000,
            connect_mode: 0,
            connect_retries: CONNECT_RETRIES,
        }
    }
}
