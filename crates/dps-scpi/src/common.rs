//! IEEE-488.2 common commands and SCPI-mandated system commands.
//!
//! These handlers only touch the interpreter status, so they work with
//! any user context. `*RST` is deliberately absent: resetting is device
//! specific and registered by the application.

use crate::error::status_bits;
use crate::registry::{Call, Command, CommandResult};

/// SCPI standard version reported by `SYSTem:VERSion?`.
pub const SCPI_STD_VERSION: &str = "1999.0";

/// Returns the common and required commands, in registration order.
pub fn common_commands<C>() -> Vec<Command<C>> {
    vec![
        // IEEE mandated commands (SCPI std V1999.0 4.1.1)
        Command::new("*CLS", core_cls::<C>),
        Command::new("*ESE", core_ese::<C>),
        Command::new("*ESE?", core_ese_q::<C>),
        Command::new("*ESR?", core_esr_q::<C>),
        Command::new("*IDN?", core_idn_q::<C>),
        Command::new("*OPC", core_opc::<C>),
        Command::new("*OPC?", core_opc_q::<C>),
        Command::new("*SRE", core_sre::<C>),
        Command::new("*SRE?", core_sre_q::<C>),
        Command::new("*STB?", core_stb_q::<C>),
        Command::new("*TST?", core_tst_q::<C>),
        Command::new("*WAI", core_wai::<C>),
        // Required SCPI commands (SCPI std V1999.0 4.2.1)
        Command::new("SYSTem:ERRor[:NEXT]?", system_error_next_q::<C>),
        Command::new("SYSTem:ERRor:COUNt?", system_error_count_q::<C>),
        Command::new("SYSTem:VERSion?", system_version_q::<C>),
        Command::new("STATus:QUEStionable[:EVENt]?", status_ques_event_q::<C>),
        Command::new("STATus:QUEStionable:ENABle", status_ques_enable::<C>),
        Command::new("STATus:QUEStionable:ENABle?", status_ques_enable_q::<C>),
        Command::new("STATus:PRESet", status_preset::<C>),
    ]
}

/// Keeps the low eight bits; IEEE-488.2 registers are one byte wide.
fn register_byte(value: i32) -> u8 {
    (value & 0xFF) as u8
}

fn core_cls<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    call.status().clear();
    Ok(())
}

fn core_ese<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let value = call.required::<i32>()?;
    call.status().ese = register_byte(value);
    Ok(())
}

fn core_ese_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let ese = call.status().ese;
    call.result_int(i64::from(ese));
    Ok(())
}

fn core_esr_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let esr = std::mem::take(&mut call.status().esr);
    call.result_int(i64::from(esr));
    Ok(())
}

fn core_idn_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let identity = call.status().identity().clone();
    call.result_mnemonic(&identity.manufacturer);
    call.result_mnemonic(&identity.model);
    call.result_mnemonic(&identity.serial);
    call.result_mnemonic(&identity.firmware);
    Ok(())
}

fn core_opc<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    call.status().esr |= status_bits::OPC;
    Ok(())
}

fn core_opc_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    // Commands execute synchronously, so all operations are complete.
    call.result_int(1);
    Ok(())
}

fn core_sre<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let value = call.required::<i32>()?;
    call.status().sre = register_byte(value);
    Ok(())
}

fn core_sre_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let sre = call.status().sre;
    call.result_int(i64::from(sre));
    Ok(())
}

fn core_stb_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let stb = call.status().stb();
    call.result_int(i64::from(stb));
    Ok(())
}

fn core_tst_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    call.result_int(0);
    Ok(())
}

fn core_wai<C>(_: &mut C, _: &mut Call<'_>) -> CommandResult {
    Ok(())
}

fn system_error_next_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    match call.status().pop_error() {
        Some(err) => {
            call.result_int(i64::from(err.code()));
            call.result_text(&err.to_string());
        }
        None => {
            call.result_int(0);
            call.result_text("No error");
        }
    }
    Ok(())
}

fn system_error_count_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let count = call.status().error_count();
    call.result_int(i64::try_from(count).unwrap_or(i64::MAX));
    Ok(())
}

fn system_version_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    call.result_mnemonic(SCPI_STD_VERSION);
    Ok(())
}

fn status_ques_event_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let event = std::mem::take(&mut call.status().ques_event);
    call.result_int(i64::from(event));
    Ok(())
}

fn status_ques_enable<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let value = call.required::<i32>()?;
    call.status().ques_enable = (value & 0xFFFF) as u16;
    Ok(())
}

fn status_ques_enable_q<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    let enable = call.status().ques_enable;
    call.result_int(i64::from(enable));
    Ok(())
}

fn status_preset<C>(_: &mut C, call: &mut Call<'_>) -> CommandResult {
    call.status().ques_enable = 0;
    Ok(())
}
