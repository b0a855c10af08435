//! Request payloads and response decoding.

use dps_core::Operation;

/// Command codes understood by the firmware.
pub mod code {
    pub const PING: u8 = 1;
    pub const QUERY: u8 = 4;
    pub const LOCK: u8 = 7;
    pub const ENABLE_OUTPUT: u8 = 12;
    pub const SET_PARAMETERS: u8 = 14;
    pub const CHANGE_SCREEN: u8 = 21;
    pub const SET_BRIGHTNESS: u8 = 22;
}

/// Bit set in the first byte of every response.
pub const RESPONSE_FLAG: u8 = 0x80;

/// Status byte of a successful response.
pub const STATUS_SUCCESS: u8 = 1;

/// A request sent to the supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Ping,
    Query,
    Lock(bool),
    EnableOutput(bool),
    /// Sets one named parameter of the active function, e.g. `voltage`.
    SetParameter { name: &'static str, value: i32 },
    ChangeScreen(u8),
    SetBrightness(u8),
}

impl Request {
    /// Returns the command code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Ping => code::PING,
            Self::Query => code::QUERY,
            Self::Lock(_) => code::LOCK,
            Self::EnableOutput(_) => code::ENABLE_OUTPUT,
            Self::SetParameter { .. } => code::SET_PARAMETERS,
            Self::ChangeScreen(_) => code::CHANGE_SCREEN,
            Self::SetBrightness(_) => code::SET_BRIGHTNESS,
        }
    }

    /// Returns the driver operation this request carries out.
    pub fn operation(&self) -> Operation {
        match self {
            Self::Ping => Operation::Ping,
            Self::Query => Operation::Query,
            Self::Lock(_) => Operation::Lock,
            Self::EnableOutput(_) => Operation::Power,
            Self::SetParameter { name: "current", .. } => Operation::Current,
            Self::SetParameter { .. } => Operation::Voltage,
            Self::ChangeScreen(_) => Operation::Screen,
            Self::SetBrightness(_) => Operation::Brightness,
        }
    }

    /// Builds the unframed payload.
    pub fn payload(&self) -> Vec<u8> {
        let mut payload = vec![self.code()];
        match self {
            Self::Ping | Self::Query => {}
            Self::Lock(on) | Self::EnableOutput(on) => payload.push(u8::from(*on)),
            Self::SetParameter { name, value } => {
                // NUL terminated name/value string pair
                payload.extend_from_slice(name.as_bytes());
                payload.push(0);
                payload.extend_from_slice(value.to_string().as_bytes());
                payload.push(0);
            }
            Self::ChangeScreen(value) | Self::SetBrightness(value) => payload.push(*value),
        }
        payload
    }
}

/// Splits a response payload into its status byte and data.
///
/// Fails if the payload does not answer `request_code`.
pub fn split_response(request_code: u8, payload: &[u8]) -> Result<(u8, &[u8]), String> {
    match payload {
        [code, status, data @ ..] if *code == request_code | RESPONSE_FLAG => Ok((*status, data)),
        [code, ..] => Err(format!(
            "expected response code {:#04x}, got {code:#04x}",
            request_code | RESPONSE_FLAG
        )),
        [] => Err("empty response".to_string()),
    }
}

/// Telemetry carried by a query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryReply {
    pub input_millivolts: u16,
    pub output_millivolts: u16,
    pub output_milliamps: u16,
    pub output_enabled: bool,
}

impl QueryReply {
    /// Decodes the data following the status byte.
    pub fn parse(data: &[u8]) -> Result<Self, String> {
        match data {
            [vi_hi, vi_lo, vo_hi, vo_lo, io_hi, io_lo, enabled, ..] => Ok(Self {
                input_millivolts: u16::from_be_bytes([*vi_hi, *vi_lo]),
                output_millivolts: u16::from_be_bytes([*vo_hi, *vo_lo]),
                output_milliamps: u16::from_be_bytes([*io_hi, *io_lo]),
                output_enabled: *enabled != 0,
            }),
            _ => Err(format!("query reply has {} data bytes, need 7", data.len())),
        }
    }

    /// Encodes the reply data; the inverse of [`QueryReply::parse`].
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(7);
        data.extend_from_slice(&self.input_millivolts.to_be_bytes());
        data.extend_from_slice(&self.output_millivolts.to_be_bytes());
        data.extend_from_slice(&self.output_milliamps.to_be_bytes());
        data.push(u8::from(self.output_enabled));
        data
    }
}
