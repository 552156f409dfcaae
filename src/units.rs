//! Conversion of raw register values into physical wind values.
//!
//! The sensors report fixed-point values: speed in 0.1 m/s steps, direction
//! in 0.1° steps, and the Beaufort level as a plain integer register.

use std::fmt::{
    Debug,
    Display,
};

use serde::Serialize;

use crate::types::RawRegisters;

/// Register steps per m/s.
pub const SPEED_SCALE: f64 = 10.0;

/// Register steps per degree.
pub const DIRECTION_SCALE: f64 = 10.0;

const BEAUFORT_DESCRIPTIONS: [&str; 13] = [
    "calm",
    "light air",
    "light breeze",
    "gentle breeze",
    "moderate breeze",
    "fresh breeze",
    "strong breeze",
    "near gale",
    "gale",
    "strong gale",
    "storm",
    "violent storm",
    "hurricane",
];

/// Upper speed bound in m/s (exclusive) for each Beaufort level below 12.
const BEAUFORT_THRESHOLDS: [f64; 12] = [
    0.3, 1.6, 3.4, 5.5, 8.0, 10.8, 13.9, 17.2, 20.8, 24.5, 28.5, 32.7,
];

pub fn speed_ms(raw: u16) -> f64 {
    f64::from(raw) / SPEED_SCALE
}

pub fn speed_kmh(speed_ms: f64) -> f64 {
    speed_ms * 3.6
}

/// Direction in degrees, normalized into `[0, 360)`.
pub fn direction_degrees(raw: u16) -> f64 {
    (f64::from(raw) / DIRECTION_SCALE) % 360.0
}

/// A Beaufort scale level, clamped to `0..=12`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Beaufort(u8);

impl Beaufort {
    /// From the level register. Values above 12 clamp to 12.
    pub fn from_level(raw: u16) -> Self {
        Self(raw.min(12) as u8)
    }

    /// Classify a wind speed against the Beaufort thresholds.
    pub fn from_speed_ms(speed_ms: f64) -> Self {
        for (level, threshold) in BEAUFORT_THRESHOLDS.iter().enumerate() {
            if speed_ms < *threshold {
                return Self(level as u8);
            }
        }
        Self(12)
    }

    pub fn level(&self) -> u8 {
        self.0
    }

    pub fn description(&self) -> &'static str {
        BEAUFORT_DESCRIPTIONS[usize::from(self.0)]
    }
}

impl Display for Beaufort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.0, self.description())
    }
}

impl Debug for Beaufort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Beaufort({})", self.0)
    }
}

const SECTOR_WIDTH: f64 = 22.5;

/// The 16 point compass rose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cardinal {
    N,
    Nne,
    Ne,
    Ene,
    E,
    Ese,
    Se,
    Sse,
    S,
    Ssw,
    Sw,
    Wsw,
    W,
    Wnw,
    Nw,
    Nnw,
}

impl Cardinal {
    /// Clockwise from north; the index doubles as the sensor's direction
    /// code register value.
    const ALL: [Self; 16] = [
        Self::N,
        Self::Nne,
        Self::Ne,
        Self::Ene,
        Self::E,
        Self::Ese,
        Self::Se,
        Self::Sse,
        Self::S,
        Self::Ssw,
        Self::Sw,
        Self::Wsw,
        Self::W,
        Self::Wnw,
        Self::Nw,
        Self::Nnw,
    ];

    /// Sector lookup over half-open sectors `[center - 11.25, center + 11.25)`
    /// with north centered on 0°. A value exactly on a boundary belongs to
    /// the sector that starts there: 11.25° is NNE, 348.75° is N.
    pub fn from_degrees(degrees: f64) -> Self {
        let normalized = degrees.rem_euclid(360.0);
        let sector = ((normalized + SECTOR_WIDTH / 2.0) / SECTOR_WIDTH) as usize % 16;
        Self::ALL[sector]
    }

    /// From the direction code register, `0x00` = N through `0x0F` = NNW.
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::N => "N",
            Self::Nne => "NNE",
            Self::Ne => "NE",
            Self::Ene => "ENE",
            Self::E => "E",
            Self::Ese => "ESE",
            Self::Se => "SE",
            Self::Sse => "SSE",
            Self::S => "S",
            Self::Ssw => "SSW",
            Self::Sw => "SW",
            Self::Wsw => "WSW",
            Self::W => "W",
            Self::Wnw => "WNW",
            Self::Nw => "NW",
            Self::Nnw => "NNW",
        }
    }
}

impl Display for Cardinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical wind values converted from one report frame.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct WindMeasurement {
    pub speed_ms: f64,
    pub speed_kmh: f64,
    pub beaufort_level: u8,
    pub beaufort_description: &'static str,
    pub direction_degrees: f64,
    pub cardinal: Cardinal,
}

impl WindMeasurement {
    pub fn from_registers(registers: &RawRegisters) -> Self {
        let speed_ms = speed_ms(registers.speed);
        let beaufort = Beaufort::from_level(registers.level);
        let direction_degrees = direction_degrees(registers.angle);

        Self {
            speed_ms,
            speed_kmh: speed_kmh(speed_ms),
            beaufort_level: beaufort.level(),
            beaufort_description: beaufort.description(),
            direction_degrees,
            cardinal: Cardinal::from_degrees(direction_degrees),
        }
    }
}
