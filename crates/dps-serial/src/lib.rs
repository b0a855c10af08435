//! DPS Serial - Driver for DPS power supplies over a serial link
//!
//! This crate talks to a supply running OpenDPS firmware:
//! - `frame` - the delimited, byte-stuffed, CRC protected frame codec
//! - `command` - request payloads and response decoding per command
//! - `supply` - `SerialSupply`, the `PowerSupply` implementation
//!
//! # Panic-Free Guarantees
//!
//! No `.unwrap()`, `.expect()`, `panic!()` or direct indexing outside
//! tests. Every malformed byte from the device surfaces as a
//! `FrameError` or `DeviceError`.

pub mod command;
pub mod frame;
pub mod supply;

pub use frame::{crc16, decode, encode, read_frame, FrameError};
pub use supply::{SerialSupply, DEFAULT_BAUD_RATE, RESPONSE_TIMEOUT};
