//-----------------------------------------------------------------------------
// xcp_flash_cli - command-line front-end for xcp_flash
//
// Parses arguments, wires a concrete transport, drives the orchestrator, and logs
// progress and the final result. Owns no protocol logic (§4.5): all of it lives in the
// xcp_flash library, this binary only makes it runnable from a terminal.
//
// Run:
// cargo r -p xcp_flash_cli -- --firmware app.s19 --dest-addr 127.0.0.1:5555

use clap::Parser;
use log::{error, info};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use xcp_flash::transport::loopback::{LoopbackTransport, ModelSlave};
use xcp_flash::{run_update, Settings, XcpMaster};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the S-record (.s19/.srec) firmware image to program.
    #[arg(short, long)]
    firmware: PathBuf,

    /// XCP slave address (UDP transport only; requires the `udp` feature).
    #[arg(short, long, default_value = "127.0.0.1:5555")]
    dest_addr: SocketAddr,

    /// Local bind address for the UDP transport.
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind_addr: SocketAddr,

    /// Run against an in-process model slave instead of a real target; useful to
    /// exercise the full update procedure without hardware.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// XCP CONNECT mode byte (slave-specific, e.g. a node id).
    #[arg(long, default_value_t = 0)]
    connect_mode: u8,

    /// T6: CONNECT response timeout (ms).
    #[arg(long, default_value_t = Settings::default().timeout_t6)]
    timeout_connect_ms: u32,

    /// T4: PROGRAM_CLEAR response timeout (ms).
    #[arg(long, default_value_t = Settings::default().timeout_t4)]
    timeout_erase_ms: u32,

    /// Log level (Off=0, Error=1, Warn=2, Info=3, Debug=4, Trace=5).
    #[arg(short, long, default_value_t = 3)]
    log_level: u8,
}

trait ToLogLevelFilter {
    fn to_log_level_filter(self) -> log::LevelFilter;
}

impl ToLogLevelFilter for u8 {
    fn to_log_level_filter(self) -> log::LevelFilter {
        match self {
            0 => log::LevelFilter::Off,
            1 => log::LevelFilter::Error,
            2 => log::LevelFilter::Warn,
            3 => log::LevelFilter::Info,
            4 => log::LevelFilter::Debug,
            5 => log::LevelFilter::Trace,
            _ => log::LevelFilter::Warn,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new().filter_level(args.log_level.to_log_level_filter()).format_timestamp_millis().init();

    let mut settings = Settings::default();
    settings.connect_mode = args.connect_mode;
    settings.timeout_t6 = args.timeout_connect_ms;
    settings.timeout_t4 = args.timeout_erase_ms;

    let mut progress = |done: u64, total: u64| {
        info!("programming: {done}/{total} bytes ({:.0}%)", if total == 0 { 100.0 } else { 100.0 * done as f64 / total as f64 });
    };

    let result = if args.dry_run {
        info!("dry run: programming an in-process model slave, no network traffic");
        let mut session = XcpMaster::new(LoopbackTransport::new(ModelSlave::new()), settings);
        run_update(&args.firmware, &mut session, Some(&mut progress))
    } else {
        #[cfg(feature = "udp")]
        {
            match xcp_flash::transport::udp::UdpTransport::bind(args.bind_addr, args.dest_addr) {
                Ok(transport) => {
                    let mut session = XcpMaster::new(transport, settings);
                    run_update(&args.firmware, &mut session, Some(&mut progress))
                }
                Err(e) => {
                    error!("failed to bind UDP transport: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        #[cfg(not(feature = "udp"))]
        {
            error!("no transport available: build with --features udp, or pass --dry-run");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => {
            info!("update finished successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("update failed: {e}");
            ExitCode::FAILURE
        }
    }
}
