//! DPS SCPI - Command interpreter for Standard Commands for Programmable Instruments
//!
//! This crate turns raw bytes from a client into handler invocations and
//! formats handler results back into response lines:
//! - `pattern` - compiled command patterns (`MEASure:VOLTage[:DC]?`)
//! - `registry` - the ordered, non-ambiguous command table
//! - `params` / `response` - typed parameter access and result formatting
//! - `error` / `status` - the bounded error queue and IEEE-488.2 registers
//! - `parser` - the `Interpreter` implementation driving all of the above
//! - `common` - the IEEE-488.2 and SCPI-mandated commands
//!
//! The interpreter never touches a socket: output goes through the
//! `Transport` write primitive supplied by the caller on every input.

pub mod common;
pub mod error;
pub mod params;
pub mod parser;
pub mod pattern;
pub mod registry;
pub mod response;
pub mod status;

pub use common::common_commands;
pub use error::{ErrorQueue, ScpiError, ERROR_QUEUE_SIZE};
pub use params::{FromParam, Parameters};
pub use parser::{Interpreter, ScpiParser, Transport, INPUT_BUFFER_LENGTH};
pub use pattern::{Pattern, PatternError};
pub use registry::{Call, Command, CommandRegistry, CommandResult, Handler, RegistryError};
pub use response::Response;
pub use status::{Identity, Status};
