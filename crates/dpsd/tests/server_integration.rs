//! Integration tests for the SCPI TCP server.
//!
//! These tests run the ScpiServer on a loopback port with a simulated
//! supply and talk to it like an instrument client would: one line in,
//! one line out, one client at a time.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free policy
//! applies to production code.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dps_core::{DeviceState, Operation, SimulatedSupply};
use dps_scpi::{Identity, ScpiParser};
use dpsd::lifecycle::Lifecycle;
use dpsd::server::{build_interpreter, Listener, ScpiServer};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Idle timeout used by the test server, short enough to tick often
const TEST_IDLE_TIMEOUT: Duration = Duration::from_millis(100);

/// Maximum time to wait for a response line
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a held-back client is observed to get no answer
const STARVATION_WINDOW: Duration = Duration::from_millis(300);

// ============================================================================
// Test Helpers
// ============================================================================

/// Lifecycle reporter that counts liveness ticks and records the rest.
#[derive(Default)]
struct RecordingLifecycle {
    liveness: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl Lifecycle for RecordingLifecycle {
    fn ready(&self, status: &str) {
        self.events.lock().unwrap().push(format!("ready: {status}"));
    }

    fn liveness(&self) {
        self.liveness.fetch_add(1, Ordering::SeqCst);
    }

    fn stopping(&self, status: &str) {
        self.events.lock().unwrap().push(format!("stopping: {status}"));
    }
}

type TestScpiServer = ScpiServer<ScpiParser<SimulatedSupply>, Arc<RecordingLifecycle>>;

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: SocketAddr,
    cancel_token: CancellationToken,
    lifecycle: Arc<RecordingLifecycle>,
    handle: JoinHandle<TestScpiServer>,
}

impl TestServer {
    /// Spawns a server with a fresh simulated supply.
    async fn spawn() -> Self {
        Self::spawn_with(SimulatedSupply::new()).await
    }

    /// Spawns a server around the given supply.
    async fn spawn_with(supply: SimulatedSupply) -> Self {
        let listener = Listener::bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)))
            .expect("bind listener");
        let addr = listener.local_addr();
        let interpreter =
            build_interpreter(supply, Identity::default()).expect("build interpreter");
        let lifecycle = Arc::new(RecordingLifecycle::default());
        let cancel_token = CancellationToken::new();

        let mut server = ScpiServer::new(
            listener,
            interpreter,
            Arc::clone(&lifecycle),
            cancel_token.clone(),
        )
        .with_idle_timeout(TEST_IDLE_TIMEOUT);

        let handle = tokio::spawn(async move {
            server.run().await;
            server
        });

        Self {
            addr,
            cancel_token,
            lifecycle,
            handle,
        }
    }

    /// Opens a client connection.
    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        TestClient::new(stream)
    }

    /// Stops the server and returns it for inspection.
    async fn shutdown(self) -> TestScpiServer {
        self.cancel_token.cancel();
        timeout(RESPONSE_TIMEOUT, self.handle)
            .await
            .expect("server stops within timeout")
            .expect("server task completes")
    }
}

/// Line-oriented client.
struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("send");
    }

    async fn read_line(&mut self) -> String {
        let mut line = String::new();
        timeout(RESPONSE_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("response within timeout")
            .expect("read response");
        line
    }

    async fn query(&mut self, line: &str) -> String {
        self.send(line).await;
        self.read_line().await
    }
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test]
async fn test_output_on_off() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send("OUTP 1").await;
    assert_eq!(client.query("OUTP?").await, "1\r\n");
    client.send("OUTP 0").await;
    assert_eq!(client.query("OUTP?").await, "0\r\n");

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
async fn test_current_setpoint_round_trip() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    client.send("SOUR:CURR 0.5").await;
    assert_eq!(client.query("MEAS:CURR?").await, "0.5\r\n");

    drop(client);
    let server = server.shutdown().await;
    assert_eq!(
        server.interpreter().context().state().current_milliamps,
        500
    );
}

#[tokio::test]
async fn test_identity_and_error_queue() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;

    let idn = client.query("*IDN?").await;
    assert!(idn.starts_with("OpenDPS,DPS5005,0,"), "got {idn:?}");

    client.send("SOUR:VOLT").await;
    client.send("NOT:A:COMMand").await;
    assert_eq!(client.query("SYST:ERR:COUN?").await, "2\r\n");
    assert_eq!(
        client.query("SYST:ERR?;SYST:ERR?").await,
        "-109,\"Missing parameter\";-113,\"Undefined header\"\r\n"
    );

    drop(client);
    let server = server.shutdown().await;
    assert_eq!(
        server.interpreter().context().state(),
        DeviceState::default()
    );
}

#[tokio::test]
async fn test_device_failure_does_not_close_session() {
    let mut supply = SimulatedSupply::new();
    supply.fail_on(Operation::Power);
    let server = TestServer::spawn_with(supply).await;
    let mut client = server.connect().await;

    client.send("OUTP ON").await;
    assert_eq!(
        client.query("SYST:ERR?").await,
        "-200,\"Execution error\"\r\n"
    );
    assert_eq!(client.query("OUTP?").await, "0\r\n");

    drop(client);
    server.shutdown().await;
}

// ============================================================================
// Session policy
// ============================================================================

#[tokio::test]
async fn test_second_client_waits_for_first() {
    let server = TestServer::spawn().await;
    let mut first = server.connect().await;
    assert_eq!(first.query("*OPC?").await, "1\r\n");

    // Held in the backlog: connected, but nobody reads its bytes.
    let mut second = server.connect().await;
    second.send("OUTP?").await;
    let mut line = String::new();
    let starved = timeout(STARVATION_WINDOW, second.reader.read_line(&mut line)).await;
    assert!(starved.is_err(), "second client was served early: {line:?}");

    first.send("OUTP 1").await;
    assert_eq!(first.query("OUTP?").await, "1\r\n");
    drop(first);

    // Once the first session ends the queued request is answered.
    assert_eq!(second.read_line().await, "1\r\n");

    drop(second);
    server.shutdown().await;
}

#[tokio::test]
async fn test_partial_line_not_inherited_by_next_client() {
    let server = TestServer::spawn().await;

    let mut first = server.connect().await;
    first.writer.write_all(b"OUTP 1").await.unwrap();
    first.writer.flush().await.unwrap();
    sleep(Duration::from_millis(50)).await;
    drop(first);

    let mut second = server.connect().await;
    assert_eq!(second.query("OUTP?").await, "0\r\n");
    assert_eq!(second.query("SYST:ERR:COUN?").await, "0\r\n");

    drop(second);
    server.shutdown().await;
}

#[tokio::test]
async fn test_error_queue_persists_across_sessions() {
    let server = TestServer::spawn().await;

    let mut first = server.connect().await;
    first.send("BOGUS").await;
    assert_eq!(first.query("*OPC?").await, "1\r\n");
    drop(first);

    let mut second = server.connect().await;
    assert_eq!(
        second.query("SYST:ERR?").await,
        "-113,\"Undefined header\"\r\n"
    );

    drop(second);
    server.shutdown().await;
}

// ============================================================================
// Liveness and shutdown
// ============================================================================

#[tokio::test]
async fn test_liveness_ticks_without_client() {
    let server = TestServer::spawn().await;
    sleep(TEST_IDLE_TIMEOUT * 4).await;
    assert!(server.lifecycle.liveness.load(Ordering::SeqCst) >= 2);

    let server = server.shutdown().await;
    assert!(server.lifecycle().events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_liveness_ticks_with_idle_client() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;
    assert_eq!(client.query("*OPC?").await, "1\r\n");

    let before = server.lifecycle.liveness.load(Ordering::SeqCst);
    sleep(TEST_IDLE_TIMEOUT * 4).await;
    let after = server.lifecycle.liveness.load(Ordering::SeqCst);
    assert!(after >= before + 2, "before={before} after={after}");

    // Idle ticks never close the session.
    assert_eq!(client.query("*OPC?").await, "1\r\n");

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_with_connected_client() {
    let server = TestServer::spawn().await;
    let mut client = server.connect().await;
    assert_eq!(client.query("*OPC?").await, "1\r\n");

    // The session notices cancellation at its next idle tick.
    server.shutdown().await;

    let mut rest = String::new();
    let read = timeout(RESPONSE_TIMEOUT, client.reader.read_line(&mut rest))
        .await
        .expect("connection closed by server");
    assert_eq!(read.unwrap(), 0);
}
