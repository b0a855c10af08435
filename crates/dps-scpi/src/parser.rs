//! Byte-level SCPI interpreter.
//!
//! `ScpiParser` frames incoming bytes into lines, splits lines into
//! program messages, dispatches each message through the command
//! registry and writes the formatted response through the caller's
//! `Transport`.
//!
//! # Framing
//!
//! ```text
//!   bytes ──▶ buffer ──(\n)──▶ line ──(;)──▶ message ──▶ header + params
//!                  └──(idle tick)──▶ line      │
//!                                              ▼
//!                                     registry lookup ──▶ handler
//! ```

use std::io;

use tracing::{debug, warn};

use crate::error::ScpiError;
use crate::params::{split_unquoted, Parameters};
use crate::registry::{Call, CommandRegistry};
use crate::response::Response;
use crate::status::{Identity, Status};

/// Maximum length of an unterminated input line.
pub const INPUT_BUFFER_LENGTH: usize = 256;

/// Write primitive for response bytes.
pub trait Transport {
    /// Forwards formatted response bytes to the client.
    fn write(&mut self, data: &[u8]);
}

impl Transport for Vec<u8> {
    fn write(&mut self, data: &[u8]) {
        self.extend_from_slice(data);
    }
}

/// Output with no client attached: bytes are discarded.
impl Transport for io::Sink {
    fn write(&mut self, _data: &[u8]) {}
}

/// A command interpreter fed with raw client bytes.
pub trait Interpreter {
    /// Feeds received bytes. An empty slice is an idle tick: a pending
    /// unterminated line is executed as if it had been terminated.
    fn input(&mut self, data: &[u8], out: &mut dyn Transport);

    /// Forgets any partially received line. Called when the client that
    /// sent it goes away.
    fn detach(&mut self);
}

/// The SCPI interpreter over a user context `C`.
pub struct ScpiParser<C> {
    registry: CommandRegistry<C>,
    context: C,
    status: Status,
    response: Response,
    buffer: Vec<u8>,
    overrun: bool,
}

impl<C> ScpiParser<C> {
    /// Creates an interpreter dispatching through `registry` to `context`.
    pub fn new(registry: CommandRegistry<C>, context: C, identity: Identity) -> Self {
        Self {
            registry,
            context,
            status: Status::new(identity),
            response: Response::new(),
            buffer: Vec::with_capacity(INPUT_BUFFER_LENGTH),
            overrun: false,
        }
    }

    /// Returns the user context.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Returns the user context mutably.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Returns the instrument status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Returns the command registry.
    pub fn registry(&self) -> &CommandRegistry<C> {
        &self.registry
    }

    fn process_line(&mut self, raw: &[u8], out: &mut dyn Transport) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

        let line = match std::str::from_utf8(raw) {
            Ok(line) if line.is_ascii() => line,
            _ => {
                self.status.push_error(ScpiError::SyntaxError);
                return;
            }
        };

        match split_unquoted(line, ';') {
            Some(messages) => {
                for message in messages {
                    self.execute(message.trim());
                }
            }
            None => self.status.push_error(ScpiError::SyntaxError),
        }

        if let Some(response) = self.response.take_line() {
            out.write(response.as_bytes());
        }
    }

    fn execute(&mut self, message: &str) {
        if message.is_empty() {
            return;
        }

        let (header, params_text) = match message.find(|c: char| c.is_ascii_whitespace()) {
            Some(index) => message.split_at(index),
            None => (message, ""),
        };

        if !is_valid_header(header) {
            self.status.push_error(ScpiError::SyntaxError);
            return;
        }

        let Some((pattern, handler)) = self.registry.find(header) else {
            debug!(header, "Undefined header");
            self.status.push_error(ScpiError::UndefinedHeader);
            return;
        };

        let params = match Parameters::parse(params_text) {
            Ok(params) => params,
            Err(err) => {
                self.status.push_error(err);
                return;
            }
        };

        debug!(pattern = %pattern, "Dispatching command");

        self.response.begin_command();
        let mut call = Call::new(params, &mut self.response, &mut self.status);
        let result = handler(&mut self.context, &mut call);
        let unread = call.has_unread_params();

        match result {
            Ok(()) if unread => self.status.push_error(ScpiError::ParameterNotAllowed),
            Ok(()) => {}
            Err(err) => self.status.push_error(err),
        }
    }
}

impl<C> Interpreter for ScpiParser<C> {
    fn input(&mut self, data: &[u8], out: &mut dyn Transport) {
        if data.is_empty() {
            if !self.buffer.is_empty() && !self.overrun {
                let line = std::mem::take(&mut self.buffer);
                self.process_line(&line, out);
            }
            return;
        }

        for &byte in data {
            if byte == b'\n' {
                let line = std::mem::take(&mut self.buffer);
                if !std::mem::take(&mut self.overrun) {
                    self.process_line(&line, out);
                }
            } else if self.overrun {
                // Discard the rest of an overlong line.
            } else if self.buffer.len() >= INPUT_BUFFER_LENGTH {
                warn!(limit = INPUT_BUFFER_LENGTH, "Input line too long, discarding");
                self.buffer.clear();
                self.overrun = true;
                self.status.push_error(ScpiError::InputBufferOverrun);
            } else {
                self.buffer.push(byte);
            }
        }
    }

    fn detach(&mut self) {
        if !self.buffer.is_empty() {
            debug!(bytes = self.buffer.len(), "Discarding partial input");
        }
        self.buffer.clear();
        self.overrun = false;
    }
}

fn is_valid_header(header: &str) -> bool {
    !header.is_empty()
        && header
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '*' | '?' | '_'))
}
