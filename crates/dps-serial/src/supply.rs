//! `PowerSupply` over a serial port.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use dps_core::{DeviceError, DeviceResult, DeviceState, Operation, PowerSupply, ScreenMode};

use crate::command::{split_response, QueryReply, Request, STATUS_SUCCESS};
use crate::frame::{decode, encode, read_frame, FrameError};

/// Baud rate OpenDPS listens on out of the box.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// How long to wait for each response byte.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A supply reached through a byte stream, normally a serial port.
///
/// The firmware reports telemetry only; lock, screen and brightness are
/// the values this driver last set successfully.
pub struct SerialSupply<P = Box<dyn SerialPort>> {
    port: P,
    verbose: bool,
    lock: bool,
    screen: ScreenMode,
    brightness: i32,
}

impl SerialSupply {
    /// Opens `path` at `baud` (8N1) and checks the supply answers a ping.
    pub fn open(path: &str, baud: u32, verbose: bool) -> DeviceResult<Self> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(RESPONSE_TIMEOUT)
            .open()
            .map_err(|e| DeviceError::Io(format!("{path}: {e}")))?;

        info!(device = path, baud, "Serial port opened");
        Self::connect(port, verbose)
    }
}

impl<P: Read + Write> SerialSupply<P> {
    /// Wraps an already open stream and pings the supply.
    pub fn connect(port: P, verbose: bool) -> DeviceResult<Self> {
        let mut supply = Self {
            port,
            verbose,
            lock: false,
            screen: ScreenMode::MAIN,
            brightness: DeviceState::DEFAULT_BRIGHTNESS,
        };
        supply.transact(&Request::Ping)?;
        Ok(supply)
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Sends `request` and returns the response data after the status byte.
    fn transact(&mut self, request: &Request) -> DeviceResult<Vec<u8>> {
        let operation = request.operation();
        let frame = encode(&request.payload());
        if self.verbose {
            debug!(operation = %operation, frame = ?frame, "TX");
        }

        self.port
            .write_all(&frame)
            .and_then(|()| self.port.flush())
            .map_err(|e| DeviceError::Io(e.to_string()))?;

        let raw = read_frame(&mut self.port).map_err(|e| match e {
            FrameError::Timeout | FrameError::Closed => DeviceError::NoResponse {
                operation,
                reason: e.to_string(),
            },
            FrameError::Io(reason) => DeviceError::Io(reason),
            other => DeviceError::MalformedResponse {
                operation,
                reason: other.to_string(),
            },
        })?;
        if self.verbose {
            debug!(operation = %operation, frame = ?raw, "RX");
        }

        let payload = decode(&raw).map_err(|e| DeviceError::MalformedResponse {
            operation,
            reason: e.to_string(),
        })?;
        let (status, data) = split_response(request.code(), &payload)
            .map_err(|reason| DeviceError::MalformedResponse { operation, reason })?;

        if status != STATUS_SUCCESS {
            debug!(operation = %operation, status, "Device refused request");
            return Err(DeviceError::Rejected { operation });
        }
        Ok(data.to_vec())
    }
}

fn byte_value(field: &'static str, value: i32) -> DeviceResult<u8> {
    u8::try_from(value).map_err(|_| DeviceError::OutOfRange {
        field,
        value: i64::from(value),
        min: 0,
        max: i64::from(u8::MAX),
    })
}

impl<P: Read + Write> PowerSupply for SerialSupply<P> {
    fn power(&mut self, enabled: bool) -> DeviceResult<()> {
        self.transact(&Request::EnableOutput(enabled)).map(drop)
    }

    fn voltage(&mut self, millivolts: i32) -> DeviceResult<()> {
        self.transact(&Request::SetParameter {
            name: "voltage",
            value: millivolts,
        })
        .map(drop)
    }

    fn current(&mut self, milliamps: i32) -> DeviceResult<()> {
        self.transact(&Request::SetParameter {
            name: "current",
            value: milliamps,
        })
        .map(drop)
    }

    fn lock(&mut self, locked: bool) -> DeviceResult<()> {
        self.transact(&Request::Lock(locked))?;
        self.lock = locked;
        Ok(())
    }

    fn screen(&mut self, mode: ScreenMode) -> DeviceResult<()> {
        self.transact(&Request::ChangeScreen(mode.code()))?;
        self.screen = mode;
        Ok(())
    }

    fn brightness(&mut self, level: i32) -> DeviceResult<()> {
        let value = byte_value("brightness", level)?;
        self.transact(&Request::SetBrightness(value))?;
        self.brightness = level;
        Ok(())
    }

    fn query(&mut self) -> DeviceResult<DeviceState> {
        let data = self.transact(&Request::Query)?;
        let reply = QueryReply::parse(&data).map_err(|reason| DeviceError::MalformedResponse {
            operation: Operation::Query,
            reason,
        })?;

        Ok(DeviceState {
            output_enabled: reply.output_enabled,
            voltage_millivolts: i32::from(reply.output_millivolts),
            current_milliamps: i32::from(reply.output_milliamps),
            lock: self.lock,
            screen_mode: self.screen,
            brightness: self.brightness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{code, QueryReply, RESPONSE_FLAG};
    use std::collections::VecDeque;
    use std::io;

    /// In-memory port: records written bytes, replays queued responses.
    #[derive(Default)]
    struct MockPort {
        written: Vec<u8>,
        replies: VecDeque<u8>,
    }

    impl MockPort {
        fn reply(mut self, request_code: u8, status: u8, data: &[u8]) -> Self {
            let mut payload = vec![request_code | RESPONSE_FLAG, status];
            payload.extend_from_slice(data);
            self.replies.extend(encode(&payload));
            self
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.replies.pop_front() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
            }
            Ok(n)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn pinged() -> MockPort {
        MockPort::default().reply(code::PING, STATUS_SUCCESS, &[])
    }

    #[test]
    fn test_connect_pings() {
        let supply = SerialSupply::connect(pinged(), false).unwrap();
        let port = supply.into_inner();
        assert_eq!(port.written, encode(&[code::PING]));
    }

    #[test]
    fn test_connect_fails_without_answer() {
        let result = SerialSupply::connect(MockPort::default(), false);
        assert!(matches!(
            result,
            Err(DeviceError::NoResponse {
                operation: Operation::Ping,
                ..
            })
        ));
    }

    #[test]
    fn test_query_combines_telemetry_and_commanded_state() {
        let reply = QueryReply {
            input_millivolts: 24_000,
            output_millivolts: 5_000,
            output_milliamps: 250,
            output_enabled: true,
        };
        let port = pinged()
            .reply(code::LOCK, STATUS_SUCCESS, &[])
            .reply(code::SET_BRIGHTNESS, STATUS_SUCCESS, &[])
            .reply(code::QUERY, STATUS_SUCCESS, &reply.to_bytes());
        let mut supply = SerialSupply::connect(port, true).unwrap();

        supply.lock(true).unwrap();
        supply.brightness(80).unwrap();
        let state = supply.query().unwrap();

        assert!(state.output_enabled);
        assert_eq!(state.voltage_millivolts, 5_000);
        assert_eq!(state.current_milliamps, 250);
        assert!(state.lock);
        assert_eq!(state.brightness, 80);
        assert_eq!(state.screen_mode, ScreenMode::MAIN);
    }

    #[test]
    fn test_refused_request_keeps_cached_state() {
        let port = pinged().reply(code::LOCK, 0, &[]);
        let mut supply = SerialSupply::connect(port, false).unwrap();

        assert_eq!(
            supply.lock(true),
            Err(DeviceError::Rejected {
                operation: Operation::Lock
            })
        );
        assert!(!supply.lock);
    }

    #[test]
    fn test_mismatched_response_is_malformed() {
        let port = pinged().reply(code::QUERY, STATUS_SUCCESS, &[0; 7]);
        let mut supply = SerialSupply::connect(port, false).unwrap();
        assert!(matches!(
            supply.power(true),
            Err(DeviceError::MalformedResponse {
                operation: Operation::Power,
                ..
            })
        ));
    }

    #[test]
    fn test_brightness_out_of_byte_range() {
        let mut supply = SerialSupply::connect(pinged(), false).unwrap();
        assert!(matches!(
            supply.brightness(300),
            Err(DeviceError::OutOfRange {
                field: "brightness",
                ..
            })
        ));
    }
}
