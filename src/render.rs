//! Presentation of polling results
//!
//! The polling driver only talks to the [`Renderer`] trait. [`ConsoleRenderer`]
//! is the terminal dashboard used by the `drone-monitor` binary.

use std::io::{self, Write};
use std::time::Duration;

use chrono::Local;
use tracing::warn;

use crate::error::{ConnectionError, ModbusError, PollError};
use crate::telemetry::RegisterBlock;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Sink for everything the polling driver wants the operator to see
pub trait Renderer {
    /// Session established (initially or after a reconnect)
    fn connected(&mut self, _endpoint: &str) {}

    /// A telemetry block was read; `alert` is the fire-authorization condition
    fn telemetry(&mut self, block: &RegisterBlock, alert: bool);

    /// Response arrived but could not be used; the session is kept
    fn read_failed(&mut self, error: &ModbusError);

    /// Session lost; a reconnect follows after `backoff`
    fn connection_lost(&mut self, error: &ConnectionError, backoff: Duration);

    /// Polling is about to stop for good
    fn fatal(&mut self, error: &PollError);
}

/// Text dashboard written to any [`Write`] sink (stdout by default)
pub struct ConsoleRenderer<W: Write = io::Stdout> {
    out: W,
    clear_screen: bool,
}

impl ConsoleRenderer<io::Stdout> {
    pub fn stdout(clear_screen: bool) -> Self {
        Self::new(io::stdout(), clear_screen)
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W, clear_screen: bool) -> Self {
        Self { out, clear_screen }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit<F>(&mut self, write: F)
    where
        F: FnOnce(&mut W) -> io::Result<()>,
    {
        let result = write(&mut self.out).and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!("Console write failed: {}", e);
        }
    }

    fn write_block(out: &mut W, block: &RegisterBlock) -> io::Result<()> {
        writeln!(out, "DRONE DETECTION SYSTEM")?;
        writeln!(out, "========================")?;
        writeln!(out, "Active Drones         : {}", block.drone_count())?;
        writeln!(
            out,
            "Threat Level          : {} ({})",
            block.threat(),
            block.threat_level()
        )?;
        writeln!(
            out,
            "Fire Authorization    : {}",
            if block.fire_authorized() != 0 {
                "ACTIVE"
            } else {
                "PASSIVE"
            }
        )?;
        writeln!(out)?;

        if block.has_detections() {
            writeln!(out, "DRONE DETAILS")?;
            writeln!(out, "===================")?;
            writeln!(out, "Detection ID          : D{:03}", block.detection_id())?;
            writeln!(
                out,
                "Confidence            : {:.1}%",
                block.confidence_percent()
            )?;
            writeln!(out, "X Coordinate          : {:.3}", block.position_x())?;
            writeln!(out, "Y Coordinate          : {:.3}", block.position_y())?;
            writeln!(
                out,
                "Zone                  : {} ({})",
                block.zone(),
                block.zone_code()
            )?;
            if let Some(at) = block.detected_at() {
                writeln!(
                    out,
                    "Detection Time        : {}",
                    at.format("%Y-%m-%d %H:%M:%S UTC")
                )?;
            }
        } else {
            writeln!(out, "NO DRONES DETECTED")?;
        }

        writeln!(out)?;
        writeln!(out, "========================")
    }
}

impl<W: Write> Renderer for ConsoleRenderer<W> {
    fn connected(&mut self, endpoint: &str) {
        self.emit(|out| {
            writeln!(out, "Connected to Modbus server {}", endpoint)?;
            writeln!(out, "Reading drone detection data...")
        });
    }

    fn telemetry(&mut self, block: &RegisterBlock, alert: bool) {
        let clear = self.clear_screen;
        self.emit(|out| {
            if clear {
                write!(out, "{}", CLEAR_SCREEN)?;
            }
            writeln!(out, "=== DRONE DETECTION DATA (REAL-TIME) ===")?;
            writeln!(
                out,
                "Last update: {}",
                Local::now().format("%a %b %e %H:%M:%S %Y")
            )?;
            writeln!(out, "=========================================")?;
            writeln!(out)?;
            Self::write_block(out, block)?;

            if alert {
                writeln!(out)?;
                writeln!(out, "*** WARNING: FIRE AUTHORIZATION ACTIVE! ***")?;
                writeln!(out, "Target drone detected and ready to engage.")?;
            }
            Ok(())
        });
    }

    fn read_failed(&mut self, error: &ModbusError) {
        self.emit(|out| writeln!(out, "ERROR: Modbus read failed: {}", error));
    }

    fn connection_lost(&mut self, error: &ConnectionError, backoff: Duration) {
        self.emit(|out| {
            writeln!(out, "ERROR: Connection lost: {}", error)?;
            writeln!(out, "Reconnecting in {:?}...", backoff)
        });
    }

    fn fatal(&mut self, error: &PollError) {
        self.emit(|out| {
            writeln!(out, "FATAL: {}", error)?;
            writeln!(out, "Program terminated.")
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    fn render_block(registers: [u16; 10], alert: bool) -> String {
        let mut renderer = ConsoleRenderer::new(Vec::new(), false);
        renderer.telemetry(&RegisterBlock::new(registers), alert);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_detection_details() {
        let ts: u32 = 1_700_000_000;
        let text = render_block(
            [
                2,
                3,
                1,
                7,
                955,
                (-500i16) as u16,
                1250,
                3,
                (ts >> 16) as u16,
                ts as u16,
            ],
            true,
        );

        assert!(text.contains("Active Drones         : 2"));
        assert!(text.contains("Threat Level          : HIGH (3)"));
        assert!(text.contains("Fire Authorization    : ACTIVE"));
        assert!(text.contains("Detection ID          : D007"));
        assert!(text.contains("Confidence            : 95.5%"));
        assert!(text.contains("X Coordinate          : -0.500"));
        assert!(text.contains("Y Coordinate          : 1.250"));
        assert!(text.contains("Zone                  : EAST (3)"));
        assert!(text.contains("Detection Time        : 2023-11-14 22:13:20 UTC"));
        assert!(text.contains("FIRE AUTHORIZATION ACTIVE"));
        assert!(!text.contains(CLEAR_SCREEN));
    }

    #[test]
    fn test_no_drones() {
        let text = render_block([0; 10], false);
        assert!(text.contains("NO DRONES DETECTED"));
        assert!(text.contains("Fire Authorization    : PASSIVE"));
        assert!(!text.contains("DRONE DETAILS"));
        assert!(!text.contains("WARNING"));
    }

    #[test]
    fn test_clear_screen_prefix() {
        let mut renderer = ConsoleRenderer::new(Vec::new(), true);
        renderer.telemetry(&RegisterBlock::default(), false);
        let text = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(text.starts_with(CLEAR_SCREEN));
    }

    #[test]
    fn test_error_lines() {
        let mut renderer = ConsoleRenderer::new(Vec::new(), false);
        renderer.read_failed(&ModbusError::from(DecodeError::ByteCountMismatch {
            expected: 20,
            actual: 18,
        }));
        renderer.connection_lost(&ConnectionError::NotConnected, Duration::from_secs(2));
        let text = String::from_utf8(renderer.into_inner()).unwrap();

        assert!(text.contains("ERROR: Modbus read failed: Byte count mismatch: expected 20, got 18"));
        assert!(text.contains("ERROR: Connection lost: Session is not connected"));
        assert!(text.contains("Reconnecting in 2s..."));
    }
}
