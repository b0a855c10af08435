//! Device snapshot and screen identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DeviceError;

/// Screen shown on the supply's display.
///
/// The device addresses screens by a one-byte code; `MAIN` is the
/// voltage/current readout every supply has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScreenMode(u8);

impl ScreenMode {
    /// The main readout screen.
    pub const MAIN: ScreenMode = ScreenMode(0);

    /// The settings screen.
    pub const SETTINGS: ScreenMode = ScreenMode(1);

    /// Creates a screen mode from its raw device code.
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    /// Returns the raw device code.
    pub const fn code(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i32> for ScreenMode {
    type Error = DeviceError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| DeviceError::OutOfRange {
                field: "screen",
                value: i64::from(value),
                min: 0,
                max: i64::from(u8::MAX),
            })
    }
}

impl fmt::Display for ScreenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::MAIN => write!(f, "main"),
            Self::SETTINGS => write!(f, "settings"),
            Self(code) => write!(f, "screen {code}"),
        }
    }
}

/// A single consistent read of the supply's state.
///
/// Voltage and current are in device milli-units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Whether the output stage is switched on
    pub output_enabled: bool,

    /// Output voltage in millivolts
    pub voltage_millivolts: i32,

    /// Output current in milliamps
    pub current_milliamps: i32,

    /// Whether the front panel is locked
    pub lock: bool,

    /// Screen currently displayed
    pub screen_mode: ScreenMode,

    /// Display brightness, 0-100
    pub brightness: i32,
}

impl DeviceState {
    /// Default display brightness after reset.
    pub const DEFAULT_BRIGHTNESS: i32 = 50;
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            output_enabled: false,
            voltage_millivolts: 0,
            current_milliamps: 0,
            lock: false,
            screen_mode: ScreenMode::MAIN,
            brightness: Self::DEFAULT_BRIGHTNESS,
        }
    }
}
