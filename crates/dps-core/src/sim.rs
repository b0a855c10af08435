//! In-memory power supply.
//!
//! `SimulatedSupply` behaves like a well-mannered DPS unit: it validates
//! setpoints against its limits, reports setpoints back through `query`,
//! and keeps an ordered log of every operation it was asked to perform.
//! Any operation can be made to fail for testing error propagation.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{DeviceError, DeviceResult};
use crate::state::{DeviceState, ScreenMode};
use crate::supply::{Operation, PowerSupply};

/// Setpoint limits enforced by the simulated supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplyLimits {
    pub max_millivolts: i32,
    pub max_milliamps: i32,
    pub max_brightness: i32,
}

impl SupplyLimits {
    /// Limits of a DPS5005 (50 V / 5 A).
    pub const DPS5005: SupplyLimits = SupplyLimits {
        max_millivolts: 50_000,
        max_milliamps: 5_000,
        max_brightness: 100,
    };
}

impl Default for SupplyLimits {
    fn default() -> Self {
        Self::DPS5005
    }
}

/// A power supply that lives entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct SimulatedSupply {
    state: DeviceState,
    limits: SupplyLimits,
    failing: HashSet<Operation>,
    log: Vec<Operation>,
}

impl SimulatedSupply {
    /// Creates a supply in its power-on state with DPS5005 limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a supply with custom limits.
    pub fn with_limits(limits: SupplyLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Creates a supply starting from the given state.
    pub fn with_state(state: DeviceState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Makes every subsequent call of `operation` fail.
    pub fn fail_on(&mut self, operation: Operation) {
        self.failing.insert(operation);
    }

    /// Lets `operation` succeed again.
    pub fn recover(&mut self, operation: Operation) {
        self.failing.remove(&operation);
    }

    /// Returns the current state without recording an operation.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Returns every operation attempted so far, in order.
    pub fn operations(&self) -> &[Operation] {
        &self.log
    }

    /// Forgets the operation log.
    pub fn clear_operations(&mut self) {
        self.log.clear();
    }

    fn begin(&mut self, operation: Operation) -> DeviceResult<()> {
        self.log.push(operation);
        if self.failing.contains(&operation) {
            debug!(operation = %operation, "Simulated failure");
            return Err(DeviceError::Rejected { operation });
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: i32, max: i32) -> DeviceResult<()> {
    if (0..=max).contains(&value) {
        Ok(())
    } else {
        Err(DeviceError::OutOfRange {
            field,
            value: i64::from(value),
            min: 0,
            max: i64::from(max),
        })
    }
}

impl PowerSupply for SimulatedSupply {
    fn power(&mut self, enabled: bool) -> DeviceResult<()> {
        self.begin(Operation::Power)?;
        self.state.output_enabled = enabled;
        Ok(())
    }

    fn voltage(&mut self, millivolts: i32) -> DeviceResult<()> {
        self.begin(Operation::Voltage)?;
        check_range("voltage", millivolts, self.limits.max_millivolts)?;
        self.state.voltage_millivolts = millivolts;
        Ok(())
    }

    fn current(&mut self, milliamps: i32) -> DeviceResult<()> {
        self.begin(Operation::Current)?;
        check_range("current", milliamps, self.limits.max_milliamps)?;
        self.state.current_milliamps = milliamps;
        Ok(())
    }

    fn lock(&mut self, locked: bool) -> DeviceResult<()> {
        self.begin(Operation::Lock)?;
        self.state.lock = locked;
        Ok(())
    }

    fn screen(&mut self, mode: ScreenMode) -> DeviceResult<()> {
        self.begin(Operation::Screen)?;
        self.state.screen_mode = mode;
        Ok(())
    }

    fn brightness(&mut self, level: i32) -> DeviceResult<()> {
        self.begin(Operation::Brightness)?;
        check_range("brightness", level, self.limits.max_brightness)?;
        self.state.brightness = level;
        Ok(())
    }

    fn query(&mut self) -> DeviceResult<DeviceState> {
        self.begin(Operation::Query)?;
        Ok(self.state)
    }
}
