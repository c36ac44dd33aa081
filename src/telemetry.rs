//! Drone detection telemetry block
//!
//! The controller exposes its state as ten consecutive holding registers:
//!
//! | Register | Field | Encoding |
//! |----------|-------|----------|
//! | 0 | drone_count | u16 |
//! | 1 | threat_level | 0-3 |
//! | 2 | fire_authorized | 0/1 |
//! | 3 | detection_id | u16 |
//! | 4 | confidence | 0-1000 = 0.0-100.0 % |
//! | 5 | position_x | i16 × 0.001 |
//! | 6 | position_y | i16 × 0.001 |
//! | 7 | zone_code | 0-8 |
//! | 8 | timestamp_high | upper half of u32 Unix time |
//! | 9 | timestamp_low | lower half of u32 Unix time |

use std::fmt;

use chrono::{DateTime, Utc};

use crate::constants::TELEMETRY_REGISTER_COUNT;
use crate::error::DecodeError;

/// Number of registers in a [`RegisterBlock`]
pub const REGISTER_BLOCK_LEN: usize = TELEMETRY_REGISTER_COUNT as usize;

const DRONE_COUNT: usize = 0;
const THREAT_LEVEL: usize = 1;
const FIRE_AUTHORIZED: usize = 2;
const DETECTION_ID: usize = 3;
const CONFIDENCE: usize = 4;
const POSITION_X: usize = 5;
const POSITION_Y: usize = 6;
const ZONE_CODE: usize = 7;
const TIMESTAMP_HIGH: usize = 8;
const TIMESTAMP_LOW: usize = 9;

/// Exactly ten telemetry registers in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterBlock {
    registers: [u16; REGISTER_BLOCK_LEN],
}

impl RegisterBlock {
    pub fn new(registers: [u16; REGISTER_BLOCK_LEN]) -> Self {
        Self { registers }
    }

    pub fn registers(&self) -> &[u16; REGISTER_BLOCK_LEN] {
        &self.registers
    }

    pub fn drone_count(&self) -> u16 {
        self.registers[DRONE_COUNT]
    }

    pub fn threat_level(&self) -> u16 {
        self.registers[THREAT_LEVEL]
    }

    pub fn threat(&self) -> ThreatLevel {
        ThreatLevel::from_code(self.threat_level())
    }

    pub fn fire_authorized(&self) -> u16 {
        self.registers[FIRE_AUTHORIZED]
    }

    pub fn detection_id(&self) -> u16 {
        self.registers[DETECTION_ID]
    }

    /// Raw confidence in tenths of a percent
    pub fn confidence(&self) -> u16 {
        self.registers[CONFIDENCE]
    }

    pub fn confidence_percent(&self) -> f64 {
        f64::from(self.confidence()) / 10.0
    }

    /// Raw X register reinterpreted as signed
    pub fn position_x_raw(&self) -> i16 {
        self.registers[POSITION_X] as i16
    }

    pub fn position_y_raw(&self) -> i16 {
        self.registers[POSITION_Y] as i16
    }

    pub fn position_x(&self) -> f64 {
        f64::from(self.position_x_raw()) / 1000.0
    }

    pub fn position_y(&self) -> f64 {
        f64::from(self.position_y_raw()) / 1000.0
    }

    pub fn zone_code(&self) -> u16 {
        self.registers[ZONE_CODE]
    }

    pub fn zone(&self) -> Zone {
        Zone::from_code(self.zone_code())
    }

    pub fn timestamp_high(&self) -> u16 {
        self.registers[TIMESTAMP_HIGH]
    }

    pub fn timestamp_low(&self) -> u16 {
        self.registers[TIMESTAMP_LOW]
    }

    /// 32-bit Unix timestamp, high word first
    pub fn timestamp(&self) -> u32 {
        (u32::from(self.timestamp_high()) << 16) | u32::from(self.timestamp_low())
    }

    /// Detection time, `None` while the controller reports zero
    pub fn detected_at(&self) -> Option<DateTime<Utc>> {
        match self.timestamp() {
            0 => None,
            ts => DateTime::<Utc>::from_timestamp(i64::from(ts), 0),
        }
    }

    pub fn has_detections(&self) -> bool {
        self.drone_count() > 0
    }

    /// Fire is authorized and at least one drone is tracked
    pub fn fire_alert(&self) -> bool {
        self.fire_authorized() != 0 && self.drone_count() > 0
    }
}

impl TryFrom<&[u16]> for RegisterBlock {
    type Error = DecodeError;

    fn try_from(values: &[u16]) -> Result<Self, Self::Error> {
        let registers: [u16; REGISTER_BLOCK_LEN] =
            values.try_into().map_err(|_| DecodeError::RegisterCount {
                expected: REGISTER_BLOCK_LEN,
                actual: values.len(),
            })?;
        Ok(Self { registers })
    }
}

/// Threat level reported in register 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatLevel {
    None,
    Low,
    Medium,
    High,
    Unknown(u16),
}

impl ThreatLevel {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Low,
            2 => Self::Medium,
            3 => Self::High,
            other => Self::Unknown(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Detection zone reported in register 7
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Center,
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
    Unknown(u16),
}

impl Zone {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Center,
            1 => Self::North,
            2 => Self::South,
            3 => Self::East,
            4 => Self::West,
            5 => Self::NorthEast,
            6 => Self::NorthWest,
            7 => Self::SouthEast,
            8 => Self::SouthWest,
            other => Self::Unknown(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Center => "CENTER",
            Self::North => "NORTH",
            Self::South => "SOUTH",
            Self::East => "EAST",
            Self::West => "WEST",
            Self::NorthEast => "NORTHEAST",
            Self::NorthWest => "NORTHWEST",
            Self::SouthEast => "SOUTHEAST",
            Self::SouthWest => "SOUTHWEST",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
