//! Instrument status: error queue, IEEE-488.2 registers and identity.

use tracing::{error, info};

use crate::error::{ErrorQueue, ScpiError};

/// Status Byte bits (IEEE-488.2 11.2).
pub mod stb_bits {
    /// Error/event queue not empty
    pub const EAV: u8 = 0x04;
    /// Questionable status summary
    pub const QUES: u8 = 0x08;
    /// Event status summary
    pub const ESB: u8 = 0x20;
    /// Master summary status
    pub const MSS: u8 = 0x40;
}

/// The four `*IDN?` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            manufacturer: "OpenDPS".to_string(),
            model: "DPS5005".to_string(),
            serial: "0".to_string(),
            firmware: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Interpreter-wide status shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Status {
    errors: ErrorQueue,
    identity: Identity,
    /// Event Status Register
    pub esr: u8,
    /// Event Status Enable register
    pub ese: u8,
    /// Service Request Enable register
    pub sre: u8,
    /// Questionable event register
    pub ques_event: u16,
    /// Questionable enable register
    pub ques_enable: u16,
}

impl Status {
    /// Creates a status block reporting `identity` from `*IDN?`.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            ..Self::default()
        }
    }

    /// Returns the `*IDN?` fields.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Queues an error and latches its Event Status Register bit.
    pub fn push_error(&mut self, err: ScpiError) {
        error!(code = err.code(), message = %err, "** Error");

        let had_service_request = self.service_requested();
        self.esr |= err.esr_bit();
        self.errors.push(err);

        if !had_service_request && self.service_requested() {
            info!(stb = self.stb(), "Service request");
        }
    }

    /// Removes and returns the oldest queued error.
    pub fn pop_error(&mut self) -> Option<ScpiError> {
        self.errors.pop()
    }

    /// Returns the number of queued errors.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Implements `*CLS`: clears event registers and the error queue.
    pub fn clear(&mut self) {
        self.errors.clear();
        self.esr = 0;
        self.ques_event = 0;
    }

    /// Computes the Status Byte.
    pub fn stb(&self) -> u8 {
        let mut stb = 0;
        if !self.errors.is_empty() {
            stb |= stb_bits::EAV;
        }
        if self.ques_event & self.ques_enable != 0 {
            stb |= stb_bits::QUES;
        }
        if self.esr & self.ese != 0 {
            stb |= stb_bits::ESB;
        }
        if stb & self.sre & !stb_bits::MSS != 0 {
            stb |= stb_bits::MSS;
        }
        stb
    }

    fn service_requested(&self) -> bool {
        self.stb() & stb_bits::MSS != 0
    }
}
