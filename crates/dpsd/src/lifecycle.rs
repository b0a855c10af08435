//! Lifecycle notifications to a process supervisor.
//!
//! The daemon reports three events: ready (listener bound, accept loop
//! about to start), liveness (every idle tick) and stopping (normal
//! termination). Under systemd these become `sd_notify` datagrams; with
//! no supervisor configured they are no-ops.

use std::ffi::OsString;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

/// Environment variable systemd uses to pass the notification socket.
pub const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

/// Observer of daemon lifecycle events.
///
/// Notifications are fire-and-forget: a supervisor that cannot be
/// reached is logged, never reported back to the caller.
pub trait Lifecycle: Send + Sync {
    /// The daemon is initialized and about to serve.
    fn ready(&self, status: &str);

    /// The daemon is still making progress.
    fn liveness(&self);

    /// The daemon is shutting down normally.
    fn stopping(&self, status: &str);
}

impl<T: Lifecycle> Lifecycle for Option<T> {
    fn ready(&self, status: &str) {
        if let Some(inner) = self {
            inner.ready(status);
        }
    }

    fn liveness(&self) {
        if let Some(inner) = self {
            inner.liveness();
        }
    }

    fn stopping(&self, status: &str) {
        if let Some(inner) = self {
            inner.stopping(status);
        }
    }
}

impl<T: Lifecycle + ?Sized> Lifecycle for Arc<T> {
    fn ready(&self, status: &str) {
        (**self).ready(status);
    }

    fn liveness(&self) {
        (**self).liveness();
    }

    fn stopping(&self, status: &str) {
        (**self).stopping(status);
    }
}

/// Where notification datagrams go.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NotifyTarget {
    Path(PathBuf),
    /// Linux abstract namespace socket (`@name` in the variable)
    Abstract(Vec<u8>),
}

/// Sends `sd_notify` style datagrams to `$NOTIFY_SOCKET`.
#[derive(Debug)]
pub struct SystemdNotifier {
    socket: UnixDatagram,
    target: NotifyTarget,
}

impl SystemdNotifier {
    /// Creates a notifier if the supervisor asked for notifications.
    ///
    /// Returns `None` when `NOTIFY_SOCKET` is unset or unusable.
    pub fn from_env() -> Option<Self> {
        Self::from_var(std::env::var_os(NOTIFY_SOCKET_ENV))
    }

    fn from_var(value: Option<OsString>) -> Option<Self> {
        let value = value?;
        let target = parse_target(value)?;
        match UnixDatagram::unbound() {
            Ok(socket) => Some(Self { socket, target }),
            Err(e) => {
                warn!(error = %e, "Cannot create notification socket");
                None
            }
        }
    }

    /// Creates a notifier sending to the socket at `path`.
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        Ok(Self {
            socket: UnixDatagram::unbound()?,
            target: NotifyTarget::Path(path.into()),
        })
    }

    fn notify(&self, message: &str) {
        debug!(message, "Supervisor notification");
        if let Err(e) = self.send(message.as_bytes()) {
            warn!(error = %e, "Failed to notify supervisor");
        }
    }

    fn send(&self, message: &[u8]) -> io::Result<usize> {
        match &self.target {
            NotifyTarget::Path(path) => self.socket.send_to(message, path),
            #[cfg(target_os = "linux")]
            NotifyTarget::Abstract(name) => {
                use std::os::linux::net::SocketAddrExt;

                let addr = std::os::unix::net::SocketAddr::from_abstract_name(name)?;
                self.socket.send_to_addr(message, &addr)
            }
            #[cfg(not(target_os = "linux"))]
            NotifyTarget::Abstract(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "abstract sockets are Linux only",
            )),
        }
    }
}

fn parse_target(value: OsString) -> Option<NotifyTarget> {
    use std::os::unix::ffi::OsStringExt;

    let mut bytes = value.into_vec();
    match bytes.first().copied() {
        None => None,
        Some(b'@') => Some(NotifyTarget::Abstract(bytes.split_off(1))),
        Some(b'/') => Some(NotifyTarget::Path(PathBuf::from(OsString::from_vec(bytes)))),
        Some(_) => {
            warn!(
                var = NOTIFY_SOCKET_ENV,
                "Ignoring notification socket: not an absolute path or abstract name"
            );
            None
        }
    }
}

impl Lifecycle for SystemdNotifier {
    fn ready(&self, status: &str) {
        self.notify(&format!("READY=1\nSTATUS={status}"));
    }

    fn liveness(&self) {
        self.notify("WATCHDOG=1");
    }

    fn stopping(&self, status: &str) {
        self.notify(&format!("STOPPING=1\nSTATUS={status}"));
    }
}
