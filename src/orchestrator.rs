//----------------------------------------------------------------------------------------------
// Module orchestrator
//
// The update orchestrator (C6): open file -> connect (with retry) -> query resource
// protection -> enter programming mode -> for each segment: set MTA, erase, program in
// chunks -> reset -> close (§4.4). Connect retry and resource-protection handling live
// inside `ProgrammingSession::start`; this module only sequences the higher-level steps
// and guarantees cleanup runs on every exit path.

use crate::error::UpdateError;
use crate::session::ProgrammingSession;
use crate::srecord::SRecordReader;
use log::{error, info};
use std::path::Path;

/// Runs one firmware update to completion against `session`, reporting progress through
/// an optional `FnMut(bytes_done, bytes_total)` callback invoked after each chunk is
/// written (§4.4, supplemented progress reporting).
///
/// On any failure after the firmware file is open, cleanup (best-effort `Stop`) still
/// runs and the *first* error encountered is returned; cleanup errors are swallowed.
pub fn run_update<S: ProgrammingSession>(firmware_path: impl AsRef<Path>, session: &mut S, mut progress: Option<&mut dyn FnMut(u64, u64)>) -> Result<(), UpdateError> {
    let mut reader = SRecordReader::open(firmware_path)?;
    let total = reader.total_size();
    info!("update: {} segment(s), {total} byte(s) total", reader.segment_count());

    let result = program(&mut reader, session, total, &mut progress);

    // Cleanup always runs, regardless of where `program` failed: Stop is idempotent and
    // never propagates an error (§4.3, §7 user-visible failure behavior).
    session.stop();
    if let Err(e) = &result {
        error!("update failed: {e}");
    } else {
        info!("update complete");
    }
    result
}

fn program<S: ProgrammingSession>(reader: &mut SRecordReader, session: &mut S, total: u64, progress: &mut Option<&mut dyn FnMut(u64, u64)>) -> Result<(), UpdateError> {
    session.start()?;

    // Erase every segment before programming any, matching typical bootloader flash
    // layouts and avoiding repeated mode transitions (§4.4).
    let count = reader.segment_count();
    for i in 0..count {
        let (base, length) = reader.segment_info(i);
        session.clear(base, length)?;
    }

    let mut bytes_done: u64 = 0;
    for i in 0..count {
        reader.open_segment(i)?;
        loop {
            let Some(chunk) = reader.next_chunk()? else {
                break;
            };
            session.write(chunk.address, &chunk.data)?;
            bytes_done += chunk.data.len() as u64;
            if let Some(cb) = progress.as_mut() {
                cb(bytes_done, total);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::{LoopbackTransport, ModelSlave};
    use crate::xcp::XcpMaster;
    use std::io::Write;

    fn write_temp(lines: &[String]) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        static COUNTER: std::sync::atomic::AtomicU32 = std::sync::atomic::AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        path.push(format!("orchestrator_test_{}_{}.s19", std::process::id(), n));
        let mut f = std::fs::File::create(&path).unwrap();
        for l in lines {
            writeln!(f, "{l}").unwrap();
        }
        path
    }

    fn make_s2(address: u32, data: &[u8]) -> String {
        let addr_bytes = [(address >> 16) as u8, (address >> 8) as u8, address as u8];
        let byte_count = (addr_bytes.len() + data.len() + 1) as u8;
        let mut sum: u32 = byte_count as u32;
        for b in addr_bytes.iter().chain(data.iter()) {
            sum += *b as u32;
        }
        let checksum = !(sum as u8);
        let mut s = String::from("S2");
        s.push_str(&format!("{byte_count:02X}"));
        for b in addr_bytes {
            s.push_str(&format!("{b:02X}"));
        }
        for b in data {
            s.push_str(&format!("{b:02X}"));
        }
        s.push_str(&format!("{checksum:02X}"));
        s
    }

    #[test]
    fn end_to_end_update_round_trips_into_model_slave() {
        let payload: Vec<u8> = (0..40u8).collect();
        let path = write_temp(&[make_s2(0x8000, &payload)]);

        let slave = ModelSlave::new().with_max_prog_cto(8);
        let transport = LoopbackTransport::new(slave);
        let mut session = XcpMaster::new(transport, crate::settings::Settings::default());

        let mut seen = Vec::new();
        let mut cb = |done: u64, total: u64| seen.push((done, total));
        run_update(&path, &mut session, Some(&mut cb)).unwrap();

        assert_eq!(seen.last(), Some(&(40, 40)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn connect_retry_then_success_is_transparent_to_the_orchestrator() {
        let payload = vec![0xAAu8; 4];
        let path = write_temp(&[make_s2(0x0, &payload)]);

        let slave = ModelSlave::new();
        let transport = LoopbackTransport::new(slave).drop_first_connects(2);
        let mut session = XcpMaster::new(transport, crate::settings::Settings::default());

        run_update(&path, &mut session, None).unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn locked_slave_without_key_fails_and_still_cleans_up() {
        let payload = vec![0x01u8; 2];
        let path = write_temp(&[make_s2(0x0, &payload)]);

        let slave = ModelSlave::new().with_pgm_locked(true);
        let transport = LoopbackTransport::new(slave);
        let mut session = XcpMaster::new(transport, crate::settings::Settings::default());

        let err = run_update(&path, &mut session, None).unwrap_err();
        assert!(matches!(err, UpdateError::Xcp(crate::error::XcpError::Locked)));
        std::fs::remove_file(&path).ok();
    }
}
