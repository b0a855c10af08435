//! The instrument's command table.
//!
//! Common IEEE-488.2/SCPI commands come first, then the device commands
//! in a fixed order. Lookup is first match, and building the registry
//! fails if two patterns could match the same header.

pub mod handlers;

use dps_core::PowerSupply;
use dps_scpi::{common_commands, Command, CommandRegistry, RegistryError};

use handlers::*;

/// Returns the device commands in registration order.
pub fn device_commands<P: PowerSupply>() -> Vec<Command<P>> {
    vec![
        Command::new("*RST", rst::<P>),
        Command::new("DISPlay:BRIGhtness", display_brightness::<P>),
        Command::new("DISPlay:MODE", display_mode::<P>),
        Command::new("MEASure:VOLTage[:DC]?", measure_voltage_q::<P>),
        Command::new("SOURce:VOLTage[:DC]", source_voltage::<P>),
        Command::new("MEASure:VOLTage:DC:RATio?", measure_unsupported_q::<P>),
        Command::new("MEASure:VOLTage:AC?", measure_unsupported_q::<P>),
        Command::new("MEASure:CURRent[:DC]?", measure_current_q::<P>),
        Command::new("SOURce:CURRent[:DC]", source_current::<P>),
        Command::new("MEASure:CURRent:AC?", measure_unsupported_q::<P>),
        Command::new("MEASure:RESistance?", measure_unsupported_q::<P>),
        Command::new("MEASure:FRESistance?", measure_unsupported_q::<P>),
        Command::new("MEASure:FREQuency?", measure_unsupported_q::<P>),
        Command::new("MEASure:PERiod?", measure_unsupported_q::<P>),
        Command::new("OUTPut[:STATe]", output_state::<P>),
        Command::new("OUTPut[:STATe]?", output_state_q::<P>),
        Command::new("SYSTem:COMMunication:TCPIP:CONTROL?", tcpip_control_q::<P>),
        Command::new("SYSTem:LOCal", system_local::<P>),
        Command::new("SYSTem:RWLock", system_rwlock::<P>),
    ]
}

/// Builds the complete registry: common commands, then device commands.
pub fn build_registry<P: PowerSupply>() -> Result<CommandRegistry<P>, RegistryError> {
    let mut commands = common_commands();
    commands.extend(device_commands());
    CommandRegistry::new(commands)
}
