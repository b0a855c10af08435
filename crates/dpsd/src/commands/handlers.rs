//! Bridge handlers: one SCPI command, at most one device operation.
//!
//! Parameters are validated before the device is touched. Device
//! failures become `ScpiError::ExecutionError`; the interpreter queues
//! it, the handler never formats an error itself. Nothing is retried.

use tracing::debug;

use dps_core::{from_milli, to_milli, DeviceError, DeviceState, PowerSupply, ScreenMode};
use dps_scpi::{Call, CommandResult, ScpiError};

fn device_failure(err: DeviceError) -> ScpiError {
    debug!(error = %err, "Device operation failed");
    ScpiError::ExecutionError
}

/// Reads a required value in base units and converts it to milli-units.
fn required_milli(call: &mut Call<'_>) -> Result<i32, ScpiError> {
    let value = call.required::<f64>()?;
    to_milli(value).map_err(|err| {
        debug!(value, error = %err, "Rejected setpoint");
        ScpiError::IllegalParameterValue
    })
}

/// `*RST`: output off, panel unlocked, main screen, default brightness.
///
/// Stops at the first failing step; earlier steps are not rolled back.
pub fn rst<P: PowerSupply>(supply: &mut P, _call: &mut Call<'_>) -> CommandResult {
    debug!(command = "*RST", "Resetting device");
    supply.power(false).map_err(device_failure)?;
    supply.lock(false).map_err(device_failure)?;
    supply.screen(ScreenMode::MAIN).map_err(device_failure)?;
    supply
        .brightness(DeviceState::DEFAULT_BRIGHTNESS)
        .map_err(device_failure)
}

pub fn display_brightness<P: PowerSupply>(supply: &mut P, call: &mut Call<'_>) -> CommandResult {
    let level = call.required::<i32>()?;
    debug!(command = "DISPlay:BRIGhtness", level);
    supply.brightness(level).map_err(device_failure)
}

pub fn display_mode<P: PowerSupply>(supply: &mut P, call: &mut Call<'_>) -> CommandResult {
    let value = call.required::<i32>()?;
    let mode = ScreenMode::try_from(value).map_err(|_| ScpiError::IllegalParameterValue)?;
    debug!(command = "DISPlay:MODE", mode = %mode);
    supply.screen(mode).map_err(device_failure)
}

pub fn measure_voltage_q<P: PowerSupply>(supply: &mut P, call: &mut Call<'_>) -> CommandResult {
    debug!(command = "MEASure:VOLTage?");
    let state = supply.query().map_err(device_failure)?;
    call.result_double(from_milli(state.voltage_millivolts));
    Ok(())
}

pub fn source_voltage<P: PowerSupply>(supply: &mut P, call: &mut Call<'_>) -> CommandResult {
    let millivolts = required_milli(call)?;
    debug!(command = "SOURce:VOLTage", millivolts);
    supply.voltage(millivolts).map_err(device_failure)
}

pub fn measure_current_q<P: PowerSupply>(supply: &mut P, call: &mut Call<'_>) -> CommandResult {
    debug!(command = "MEASure:CURRent?");
    let state = supply.query().map_err(device_failure)?;
    call.result_double(from_milli(state.current_milliamps));
    Ok(())
}

pub fn source_current<P: PowerSupply>(supply: &mut P, call: &mut Call<'_>) -> CommandResult {
    let milliamps = required_milli(call)?;
    debug!(command = "SOURce:CURRent", milliamps);
    supply.current(milliamps).map_err(device_failure)
}

pub fn output_state<P: PowerSupply>(supply: &mut P, call: &mut Call<'_>) -> CommandResult {
    let enabled = call.required::<bool>()?;
    debug!(command = "OUTPut:STATe", enabled);
    supply.power(enabled).map_err(device_failure)
}

pub fn output_state_q<P: PowerSupply>(supply: &mut P, call: &mut Call<'_>) -> CommandResult {
    debug!(command = "OUTPut:STATe?");
    let state = supply.query().map_err(device_failure)?;
    call.result_int(i64::from(state.output_enabled));
    Ok(())
}

pub fn system_local<P: PowerSupply>(supply: &mut P, _call: &mut Call<'_>) -> CommandResult {
    debug!(command = "SYSTem:LOCal");
    supply.lock(false).map_err(device_failure)
}

pub fn system_rwlock<P: PowerSupply>(supply: &mut P, call: &mut Call<'_>) -> CommandResult {
    let locked = call.required::<bool>()?;
    debug!(command = "SYSTem:RWLock", locked);
    supply.lock(locked).map_err(device_failure)
}

/// Remote control over TCP/IP is always on; the setting cannot be read.
pub fn tcpip_control_q<P: PowerSupply>(_supply: &mut P, _call: &mut Call<'_>) -> CommandResult {
    debug!(command = "SYSTem:COMMunication:TCPIP:CONTROL?");
    Err(ScpiError::ExecutionError)
}

/// Measurements the supply cannot take.
pub fn measure_unsupported_q<P: PowerSupply>(_supply: &mut P, _call: &mut Call<'_>) -> CommandResult {
    debug!("Unsupported measurement");
    Err(ScpiError::HardwareMissing)
}
