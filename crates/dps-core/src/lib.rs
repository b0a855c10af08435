//! DPS Core - Device types for bench power supply control
//!
//! This crate provides the device-side vocabulary shared between
//! the serial driver (dps-serial) and the SCPI daemon (dpsd):
//! - `PowerSupply` - the synchronous driver capability
//! - `DeviceState` - a single consistent device snapshot
//! - `units` - conversion between protocol base units and device milli-units
//! - `SimulatedSupply` - an in-memory supply with failure injection
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod sim;
pub mod state;
pub mod supply;
pub mod units;

// Re-exports for convenience
pub use error::{DeviceError, DeviceResult};
pub use sim::{SimulatedSupply, SupplyLimits};
pub use state::{DeviceState, ScreenMode};
pub use supply::{Operation, PowerSupply};
pub use units::{from_milli, to_milli, UnitError};
