//! The power supply driver capability.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DeviceResult;
use crate::state::{DeviceState, ScreenMode};

/// Identifies a single driver operation.
///
/// Used for logging, error reporting and failure injection in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Ping,
    Power,
    Voltage,
    Current,
    Lock,
    Screen,
    Brightness,
    Query,
}

impl Operation {
    /// Returns the operation name as used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Power => "power",
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Lock => "lock",
            Self::Screen => "screen",
            Self::Brightness => "brightness",
            Self::Query => "query",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Synchronous control of a bench power supply.
///
/// Every call blocks until the device has answered. Implementations own
/// the device state; callers read it only through [`PowerSupply::query`]
/// and must not cache the snapshot across calls.
pub trait PowerSupply {
    /// Switches the output stage on or off.
    fn power(&mut self, enabled: bool) -> DeviceResult<()>;

    /// Sets the output voltage in millivolts.
    fn voltage(&mut self, millivolts: i32) -> DeviceResult<()>;

    /// Sets the current limit in milliamps.
    fn current(&mut self, milliamps: i32) -> DeviceResult<()>;

    /// Locks or unlocks the front panel.
    fn lock(&mut self, locked: bool) -> DeviceResult<()>;

    /// Changes the displayed screen.
    fn screen(&mut self, mode: ScreenMode) -> DeviceResult<()>;

    /// Sets the display brightness (0-100).
    fn brightness(&mut self, level: i32) -> DeviceResult<()>;

    /// Reads a consistent snapshot of the device.
    fn query(&mut self) -> DeviceResult<DeviceState>;
}

impl<T: PowerSupply + ?Sized> PowerSupply for Box<T> {
    fn power(&mut self, enabled: bool) -> DeviceResult<()> {
        (**self).power(enabled)
    }

    fn voltage(&mut self, millivolts: i32) -> DeviceResult<()> {
        (**self).voltage(millivolts)
    }

    fn current(&mut self, milliamps: i32) -> DeviceResult<()> {
        (**self).current(milliamps)
    }

    fn lock(&mut self, locked: bool) -> DeviceResult<()> {
        (**self).lock(locked)
    }

    fn screen(&mut self, mode: ScreenMode) -> DeviceResult<()> {
        (**self).screen(mode)
    }

    fn brightness(&mut self, level: i32) -> DeviceResult<()> {
        (**self).brightness(level)
    }

    fn query(&mut self) -> DeviceResult<DeviceState> {
        (**self).query()
    }
}
