//! Drone Detection Monitor
//!
//! Polls the detection controller's telemetry block once per interval and
//! shows it as a live dashboard.
//!
//! Usage: cargo run --bin drone-monitor [HOST] [PORT]
//! Example: cargo run --bin drone-monitor 192.168.1.20 8888 --cycles 60

use std::io::IsTerminal;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use drone_modbus::constants::{DEFAULT_HOST, DEFAULT_PORT};
use drone_modbus::logging::init_logging;
use drone_modbus::{ClientConfig, ConsoleRenderer, Poller, TcpConnector, VERSION};

/// Modbus TCP polling client for the drone detection controller
#[derive(Debug, Parser)]
#[command(name = "drone-monitor", author, version, about)]
struct Args {
    /// Controller host name or IP address
    #[arg(default_value = DEFAULT_HOST)]
    host: String,

    /// Controller TCP port
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Pause between polling cycles (milliseconds)
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Pause before the reconnect attempt (milliseconds)
    #[arg(long, default_value_t = 2000)]
    backoff_ms: u64,

    /// Socket connect/send/receive timeout (milliseconds)
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Stop after this many cycles instead of polling forever
    #[arg(long)]
    cycles: Option<u64>,

    /// Do not clear the screen between refreshes
    #[arg(long)]
    no_clear: bool,

    /// Log filter (trace, debug, info, warn, error or tracing directives)
    #[arg(short = 'l', long, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Write a holding register before polling starts (repeatable)
    #[arg(long = "write", value_name = "ADDR=VALUE", value_parser = parse_write)]
    writes: Vec<(u16, u16)>,
}

impl Args {
    fn config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_poll_interval(Duration::from_millis(self.interval_ms))
            .with_reconnect_backoff(Duration::from_millis(self.backoff_ms))
            .with_io_timeout(Duration::from_millis(self.timeout_ms))
            .with_max_cycles(self.cycles)
            .with_clear_screen(!self.no_clear)
    }
}

fn parse_write(arg: &str) -> Result<(u16, u16), String> {
    let (address, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=VALUE, got '{}'", arg))?;
    let address = parse_u16(address.trim())?;
    let value = parse_u16(value.trim())?;
    Ok((address, value))
}

fn parse_u16(text: &str) -> Result<u16, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid 16-bit value '{}': {}", text, e))
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level.as_deref(), std::io::stderr().is_terminal());

    let config = args.config();
    if let Err(e) = config.validate() {
        eprintln!("ERROR: {}", e);
        return ExitCode::FAILURE;
    }

    println!("=== DRONE DETECTION MODBUS TCP CLIENT v{} ===", VERSION);
    println!("Server: {}", config.endpoint());
    println!("========================================");
    println!();

    let connector = TcpConnector::new(config.host.clone(), config.port)
        .with_timeout(config.io_timeout);
    let renderer = ConsoleRenderer::stdout(config.clear_screen);
    let mut poller = Poller::new(config, connector, renderer);

    // A failed connect has already been reported as fatal by the renderer.
    if poller.connect().is_err() {
        return ExitCode::FAILURE;
    }

    for &(address, value) in &args.writes {
        match poller.write_register(address, value) {
            Ok(Ok(())) => println!("Register {} set to {}", address, value),
            Ok(Err(e)) => eprintln!("ERROR: Write {}={} failed: {}", address, value, e),
            Err(_) => return ExitCode::FAILURE,
        }
    }

    match poller.run() {
        Ok(summary) => {
            info!(
                "Sent {} requests ({} bytes), received {} responses ({} bytes)",
                summary.stats.requests_sent,
                summary.stats.bytes_sent,
                summary.stats.responses_received,
                summary.stats.bytes_received
            );
            println!("Program terminated.");
            ExitCode::SUCCESS
        }
        Err(_) => {
            let summary = poller.summary();
            info!(
                "Gave up after {} cycles, {} alerts raised",
                summary.cycles, summary.alerts
            );
            ExitCode::FAILURE
        }
    }
}
