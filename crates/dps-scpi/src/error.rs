//! SCPI error codes and the bounded error queue.

use std::collections::VecDeque;

use thiserror::Error;

/// Number of entries the error queue holds.
pub const ERROR_QUEUE_SIZE: usize = 16;

/// An entry of the SCPI error/event queue.
///
/// Codes and messages follow SCPI-99 volume 2, chapter 21.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScpiError {
    #[error("Command error")]
    CommandError,

    #[error("Syntax error")]
    SyntaxError,

    #[error("Data type error")]
    DataTypeError,

    #[error("Parameter not allowed")]
    ParameterNotAllowed,

    #[error("Missing parameter")]
    MissingParameter,

    #[error("Undefined header")]
    UndefinedHeader,

    #[error("Execution error")]
    ExecutionError,

    #[error("Data out of range")]
    DataOutOfRange,

    #[error("Illegal parameter value")]
    IllegalParameterValue,

    #[error("Hardware missing")]
    HardwareMissing,

    #[error("System error")]
    SystemError,

    #[error("Queue overflow")]
    QueueOverflow,

    #[error("Input buffer overrun")]
    InputBufferOverrun,
}

impl ScpiError {
    /// Returns the numeric SCPI error code.
    pub fn code(&self) -> i16 {
        match self {
            Self::CommandError => -100,
            Self::SyntaxError => -102,
            Self::DataTypeError => -104,
            Self::ParameterNotAllowed => -108,
            Self::MissingParameter => -109,
            Self::UndefinedHeader => -113,
            Self::ExecutionError => -200,
            Self::DataOutOfRange => -222,
            Self::IllegalParameterValue => -224,
            Self::HardwareMissing => -241,
            Self::SystemError => -310,
            Self::QueueOverflow => -350,
            Self::InputBufferOverrun => -363,
        }
    }

    /// Returns the Event Status Register bit this error sets.
    pub fn esr_bit(&self) -> u8 {
        match self.code() {
            -199..=-100 => status_bits::CME,
            -299..=-200 => status_bits::EXE,
            -499..=-400 => status_bits::QYE,
            _ => status_bits::DDE,
        }
    }
}

/// Event Status Register bits (IEEE-488.2 11.5.1).
pub mod status_bits {
    /// Operation complete
    pub const OPC: u8 = 0x01;
    /// Query error
    pub const QYE: u8 = 0x04;
    /// Device-dependent error
    pub const DDE: u8 = 0x08;
    /// Execution error
    pub const EXE: u8 = 0x10;
    /// Command error
    pub const CME: u8 = 0x20;
}

/// FIFO of pending errors with a fixed capacity.
///
/// When an error arrives while the queue is full, the newest error is
/// dropped and the last slot is replaced by `QueueOverflow`, so a reader
/// always learns that errors were lost.
#[derive(Debug, Clone)]
pub struct ErrorQueue {
    entries: VecDeque<ScpiError>,
    capacity: usize,
}

impl ErrorQueue {
    /// Creates an empty queue holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Appends an error, applying the overflow policy when full.
    pub fn push(&mut self, error: ScpiError) {
        if self.entries.len() < self.capacity {
            self.entries.push_back(error);
        } else if let Some(last) = self.entries.back_mut() {
            *last = ScpiError::QueueOverflow;
        }
    }

    /// Removes and returns the oldest error.
    pub fn pop(&mut self) -> Option<ScpiError> {
        self.entries.pop_front()
    }

    /// Returns the number of queued errors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no error is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discards every queued error.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ErrorQueue {
    fn default() -> Self {
        Self::new(ERROR_QUEUE_SIZE)
    }
}
