//! The per-connection session loop.
//!
//! ```text
//!            ┌──────────── timeout (5 s) ───────────┐
//!            │  liveness + empty input (idle tick)  │
//!            ▼                                      │
//!   ACTIVE ──┴── wait for bytes ──┬── n > 0 ──▶ interpreter ──▶ ACTIVE
//!                                 ├── 0 ──────▶ CLOSE (peer closed)
//!                                 └── error ──▶ CLOSE (read failed)
//! ```
//!
//! The session never ends the process. Whatever the exit path, the
//! interpreter's partial input is dropped before the stream is released.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use dps_scpi::Interpreter;

use crate::lifecycle::Lifecycle;

/// How long to wait for client bytes before an idle tick.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bytes read from the client per wakeup.
pub const READ_CHUNK_SIZE: usize = 10;

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Read from client failed: {0}")]
    Read(#[source] io::Error),

    #[error("Write to client failed: {0}")]
    Write(#[source] io::Error),
}

/// Why a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed its end
    PeerClosed,
    /// The daemon is shutting down
    Shutdown,
}

/// One connected client.
///
/// Holds the stream exclusively; it is dropped when [`Session::run`]
/// returns.
pub struct Session<'a, S, I: ?Sized, L: ?Sized> {
    stream: S,
    peer: SocketAddr,
    interpreter: &'a mut I,
    lifecycle: &'a L,
    cancel: CancellationToken,
    idle_timeout: Duration,
}

impl<'a, S, I, L> Session<'a, S, I, L>
where
    S: AsyncRead + AsyncWrite + Unpin,
    I: Interpreter + ?Sized,
    L: Lifecycle + ?Sized,
{
    /// Binds a client stream to the interpreter.
    pub fn new(
        stream: S,
        peer: SocketAddr,
        interpreter: &'a mut I,
        lifecycle: &'a L,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            peer,
            interpreter,
            lifecycle,
            cancel,
            idle_timeout: IDLE_TIMEOUT,
        }
    }

    /// Overrides the idle timeout.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Serves the client until it disconnects, fails or shutdown is requested.
    pub async fn run(mut self) -> Result<CloseReason, SessionError> {
        let result = self.serve().await;
        self.interpreter.detach();
        result
    }

    async fn serve(&mut self) -> Result<CloseReason, SessionError> {
        let mut buf = [0u8; READ_CHUNK_SIZE];

        loop {
            if self.cancel.is_cancelled() {
                return Ok(CloseReason::Shutdown);
            }

            match tokio::time::timeout(self.idle_timeout, self.stream.read(&mut buf)).await {
                Err(_elapsed) => {
                    self.lifecycle.liveness();
                    self.feed(&[]).await?;
                }
                Ok(Ok(0)) => return Ok(CloseReason::PeerClosed),
                Ok(Ok(n)) => {
                    let data = buf.get(..n).unwrap_or_default();
                    self.feed(data).await?;
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Err(SessionError::Read(e)),
            }
        }
    }

    /// Runs the interpreter over `data` and sends whatever it produced.
    async fn feed(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let mut out = Vec::new();
        // Handlers call the device synchronously, so this blocks the task
        // until the device answers. `block_in_place` is not an option: it
        // panics on a current-thread runtime.
        self.interpreter.input(data, &mut out);
        if out.is_empty() {
            return Ok(());
        }

        debug!(peer = %self.peer, bytes = out.len(), "Sending response");
        self.stream
            .write_all(&out)
            .await
            .map_err(SessionError::Write)?;
        self.stream.flush().await.map_err(SessionError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use dps_scpi::Transport;

    /// Echoes every complete input back and records idle ticks.
    #[derive(Default)]
    struct EchoInterpreter {
        pending: Vec<u8>,
        idle_ticks: usize,
        detached: bool,
    }

    impl Interpreter for EchoInterpreter {
        fn input(&mut self, data: &[u8], out: &mut dyn Transport) {
            if data.is_empty() {
                self.idle_ticks += 1;
                return;
            }
            self.pending.extend_from_slice(data);
            if self.pending.ends_with(b"\n") {
                out.write(&self.pending);
                self.pending.clear();
            }
        }

        fn detach(&mut self) {
            self.pending.clear();
            self.detached = true;
        }
    }

    #[derive(Default)]
    struct CountingLifecycle {
        liveness: AtomicUsize,
        log: Mutex<Vec<String>>,
    }

    impl Lifecycle for CountingLifecycle {
        fn ready(&self, status: &str) {
            self.log.lock().unwrap().push(status.to_string());
        }

        fn liveness(&self) {
            self.liveness.fetch_add(1, Ordering::SeqCst);
        }

        fn stopping(&self, status: &str) {
            self.log.lock().unwrap().push(status.to_string());
        }
    }

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    #[tokio::test]
    async fn test_forwards_bytes_and_responses() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut interpreter = EchoInterpreter::default();
        let lifecycle = CountingLifecycle::default();

        let session = Session::new(
            server,
            peer(),
            &mut interpreter,
            &lifecycle,
            CancellationToken::new(),
        );
        let driver = async move {
            // Longer than one read chunk, split over two writes
            client.write_all(b"*IDN?;SYST:").await.unwrap();
            client.write_all(b"ERR?\n").await.unwrap();
            let mut reply = vec![0u8; 16];
            client.read_exact(&mut reply).await.unwrap();
            reply
        };

        let (result, reply) = tokio::join!(session.run(), driver);
        assert_eq!(reply, b"*IDN?;SYST:ERR?\n");
        assert_eq!(result.unwrap(), CloseReason::PeerClosed);
        assert!(interpreter.detached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_liveness_per_idle_interval() {
        let (client, server) = tokio::io::duplex(64);
        let mut interpreter = EchoInterpreter::default();
        let lifecycle = CountingLifecycle::default();

        let session = Session::new(
            server,
            peer(),
            &mut interpreter,
            &lifecycle,
            CancellationToken::new(),
        );
        let driver = async {
            tokio::time::sleep(Duration::from_secs(16)).await;
            let ticks = lifecycle.liveness.load(Ordering::SeqCst);
            drop(client);
            ticks
        };

        let (result, ticks) = tokio::join!(session.run(), driver);
        assert_eq!(ticks, 3);
        assert_eq!(result.unwrap(), CloseReason::PeerClosed);
        assert_eq!(interpreter.idle_ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_line_dropped_on_close() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut interpreter = EchoInterpreter::default();
        let lifecycle = CountingLifecycle::default();

        let session = Session::new(
            server,
            peer(),
            &mut interpreter,
            &lifecycle,
            CancellationToken::new(),
        );
        let driver = async move {
            client.write_all(b"OUTP 1").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        };

        let (result, ()) = tokio::join!(session.run(), driver);
        assert_eq!(result.unwrap(), CloseReason::PeerClosed);
        assert!(interpreter.pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_observed_after_idle_tick() {
        let (_client, server) = tokio::io::duplex(64);
        let mut interpreter = EchoInterpreter::default();
        let lifecycle = CountingLifecycle::default();
        let cancel = CancellationToken::new();

        let session = Session::new(server, peer(), &mut interpreter, &lifecycle, cancel.clone())
            .with_idle_timeout(Duration::from_secs(1));
        let driver = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        };

        let (result, ()) = tokio::join!(session.run(), driver);
        assert_eq!(result.unwrap(), CloseReason::Shutdown);
        assert_eq!(lifecycle.liveness.load(Ordering::SeqCst), 1);
        assert!(lifecycle.log.lock().unwrap().is_empty());
    }
}
