//! Frame codec for the serial link.
//!
//! ```text
//!   0x7E | stuffed(payload ++ crc16_be(payload)) | 0x7F
//! ```
//!
//! Inside the delimiters every `0x7E`, `0x7F` and `0x7D` byte is sent as
//! `0x7D` followed by the byte XOR `0x20`.

use std::io::{self, Read};

use thiserror::Error;

/// Start of frame.
pub const SOF: u8 = 0x7E;
/// End of frame.
pub const EOF: u8 = 0x7F;
/// Escape prefix.
pub const DLE: u8 = 0x7D;
/// Mask applied to escaped bytes.
pub const XOR: u8 = 0x20;

/// Longest raw frame accepted from the device, delimiters included.
pub const MAX_FRAME_LENGTH: usize = 256;

/// Errors decoding a frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame does not start with 0x7E")]
    MissingStart,

    #[error("Frame does not end with 0x7F")]
    MissingEnd,

    #[error("Escape byte at end of frame")]
    DanglingEscape,

    #[error("Frame too short ({len} bytes after unstuffing)")]
    TooShort { len: usize },

    #[error("Frame exceeds {limit} bytes")]
    TooLong { limit: usize },

    #[error("CRC mismatch: frame says {expected:#06x}, computed {actual:#06x}")]
    Checksum { expected: u16, actual: u16 },

    #[error("Timed out waiting for a frame")]
    Timeout,

    #[error("Serial link closed")]
    Closed,

    #[error("Serial I/O error: {0}")]
    Io(String),
}

/// CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection).
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF_u16, |crc, &byte| {
        let mut crc = crc ^ (u16::from(byte) << 8);
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
        crc
    })
}

/// Wraps `payload` into a complete frame.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let crc = crc16(payload).to_be_bytes();
    let mut frame = Vec::with_capacity(payload.len() + 6);
    frame.push(SOF);
    for &byte in payload.iter().chain(crc.iter()) {
        if matches!(byte, SOF | EOF | DLE) {
            frame.push(DLE);
            frame.push(byte ^ XOR);
        } else {
            frame.push(byte);
        }
    }
    frame.push(EOF);
    frame
}

/// Unwraps a complete frame, verifying its checksum.
pub fn decode(frame: &[u8]) -> Result<Vec<u8>, FrameError> {
    let inner = frame.strip_prefix(&[SOF]).ok_or(FrameError::MissingStart)?;
    let inner = inner.strip_suffix(&[EOF]).ok_or(FrameError::MissingEnd)?;

    let mut body = Vec::with_capacity(inner.len());
    let mut bytes = inner.iter();
    while let Some(&byte) = bytes.next() {
        if byte == DLE {
            let &escaped = bytes.next().ok_or(FrameError::DanglingEscape)?;
            body.push(escaped ^ XOR);
        } else {
            body.push(byte);
        }
    }

    if body.len() < 3 {
        return Err(FrameError::TooShort { len: body.len() });
    }
    let crc_at = body.len() - 2;
    let crc_bytes = body.split_off(crc_at);
    let expected = match crc_bytes.as_slice() {
        [hi, lo] => u16::from_be_bytes([*hi, *lo]),
        _ => return Err(FrameError::TooShort { len: body.len() }),
    };
    let actual = crc16(&body);
    if expected != actual {
        return Err(FrameError::Checksum { expected, actual });
    }
    Ok(body)
}

/// Reads one raw frame from `reader`, discarding noise before the start byte.
///
/// The reader's own timeout bounds every byte; a timeout surfaces as
/// [`FrameError::Timeout`].
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut frame = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Err(FrameError::Closed),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                return Err(FrameError::Timeout)
            }
            Err(e) => return Err(FrameError::Io(e.to_string())),
        }

        let [b] = byte;
        if frame.is_empty() && b != SOF {
            continue;
        }
        // A second start byte means the previous frame was truncated.
        if b == SOF {
            frame.clear();
        }
        frame.push(b);
        if b == EOF {
            return Ok(frame);
        }
        if frame.len() >= MAX_FRAME_LENGTH {
            return Err(FrameError::TooLong {
                limit: MAX_FRAME_LENGTH,
            });
        }
    }
}
