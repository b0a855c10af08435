//! SCPI-over-TCP server.
//!
//! The server:
//! - Accepts one client at a time on the listener
//! - Runs a `Session` for that client to completion before accepting again
//! - Ticks the lifecycle reporter and the interpreter while nobody is connected
//! - Stops at the next wait boundary once the cancellation token fires
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    ScpiServer   │
//! │                 │
//! │    Listener     │───── timeout ───▶ liveness + idle tick
//! └───────┬─────────┘
//!         │ accept_next()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │     Session     │────▶│   Interpreter   │
//! │ (runs inline)   │     │ (owned by the   │
//! └─────────────────┘     │    server)      │
//!                         └─────────────────┘
//! ```
//!
//! Everything runs on one task: a slow device call stalls accepting too,
//! which is acceptable with a single client.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Accept and session failures are logged and the server keeps serving

mod listener;
mod session;

pub use listener::{Listener, ListenerError, BACKLOG};
pub use session::{CloseReason, Session, SessionError, IDLE_TIMEOUT, READ_CHUNK_SIZE};

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dps_core::PowerSupply;
use dps_scpi::{Identity, Interpreter, RegistryError, ScpiParser};

use crate::commands::build_registry;
use crate::lifecycle::Lifecycle;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Errors setting up the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("Invalid command table: {0}")]
    Registry(#[from] RegistryError),
}

/// Builds the SCPI interpreter for `supply` with the full command table.
pub fn build_interpreter<P: PowerSupply>(
    supply: P,
    identity: Identity,
) -> Result<ScpiParser<P>, ServerError> {
    let registry = build_registry()?;
    Ok(ScpiParser::new(registry, supply, identity))
}

/// The accept loop.
pub struct ScpiServer<I, L> {
    listener: Listener,
    interpreter: I,
    lifecycle: L,
    cancel_token: CancellationToken,
    idle_timeout: Duration,
}

impl<I: Interpreter, L: Lifecycle> ScpiServer<I, L> {
    /// Creates a server over a bound listener.
    pub fn new(
        listener: Listener,
        interpreter: I,
        lifecycle: L,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            listener,
            interpreter,
            lifecycle,
            cancel_token,
            idle_timeout: IDLE_TIMEOUT,
        }
    }

    /// Overrides the accept and session idle timeout.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Returns the listener.
    pub fn listener(&self) -> &Listener {
        &self.listener
    }

    /// Returns the interpreter.
    pub fn interpreter(&self) -> &I {
        &self.interpreter
    }

    /// Returns the lifecycle reporter.
    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    /// Serves clients until the cancellation token fires.
    ///
    /// Cancellation is checked after every accept timeout and between
    /// sessions, so shutdown takes at most one idle timeout.
    pub async fn run(&mut self) {
        loop {
            if self.cancel_token.is_cancelled() {
                info!("Server shutdown requested");
                break;
            }

            match self.listener.accept_next(self.idle_timeout).await {
                Ok(None) => {
                    self.lifecycle.liveness();
                    self.interpreter.input(&[], &mut io::sink());
                }
                Ok(Some((stream, peer))) => {
                    info!(peer = %peer, "Connection established");

                    let session = Session::new(
                        stream,
                        peer,
                        &mut self.interpreter,
                        &self.lifecycle,
                        self.cancel_token.clone(),
                    )
                    .with_idle_timeout(self.idle_timeout);

                    match session.run().await {
                        Ok(reason) => info!(peer = %peer, reason = ?reason, "Connection closed"),
                        Err(e) => warn!(peer = %peer, error = %e, "Connection closed"),
                    }
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }
}
