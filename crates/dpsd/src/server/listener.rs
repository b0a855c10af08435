//! TCP listener serving one client at a time.
//!
//! The socket is dual-stack where the host supports IPv6, reuses its
//! address and keeps a backlog of one: a second client is held by the
//! kernel until the current session ends.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Pending connections the kernel keeps while a session is active.
pub const BACKLOG: i32 = 1;

/// Errors binding or accepting.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to create socket: {source}")]
    Socket {
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to register listener with the runtime: {source}")]
    Register {
        #[source]
        source: io::Error,
    },

    #[error("Failed to accept connection: {source}")]
    Accept {
        #[source]
        source: io::Error,
    },
}

/// The server socket.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Listens on `port` on all interfaces, IPv4 and IPv6.
    ///
    /// Falls back to IPv4 only when the host has no IPv6 support.
    /// Must be called from within a tokio runtime.
    pub fn bind(port: u16) -> Result<Self, ListenerError> {
        let v6 = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
        match Socket::new(Domain::IPV6, Type::STREAM, Some(Protocol::TCP)) {
            Ok(socket) => Self::listen(socket, v6),
            Err(e) => {
                debug!(error = %e, "IPv6 unavailable, listening on IPv4 only");
                Self::bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            }
        }
    }

    /// Listens on a specific address.
    pub fn bind_addr(addr: SocketAddr) -> Result<Self, ListenerError> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|source| ListenerError::Socket { source })?;
        Self::listen(socket, addr)
    }

    fn listen(socket: Socket, addr: SocketAddr) -> Result<Self, ListenerError> {
        let bind_err = |source| ListenerError::Bind { addr, source };

        if addr.is_ipv6() {
            socket.set_only_v6(false).map_err(bind_err)?;
        }
        socket.set_reuse_address(true).map_err(bind_err)?;
        socket.bind(&addr.into()).map_err(bind_err)?;
        socket
            .listen(BACKLOG)
            .map_err(|source| ListenerError::Listen { addr, source })?;
        socket
            .set_nonblocking(true)
            .map_err(|source| ListenerError::Register { source })?;

        let inner = TcpListener::from_std(socket.into())
            .map_err(|source| ListenerError::Register { source })?;
        let local_addr = inner
            .local_addr()
            .map_err(|source| ListenerError::Register { source })?;

        Ok(Self { inner, local_addr })
    }

    /// Returns the bound address (with the real port if 0 was requested).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits up to `timeout` for a client.
    ///
    /// Returns `Ok(None)` when the timeout elapses first.
    pub async fn accept_next(
        &self,
        timeout: Duration,
    ) -> Result<Option<(TcpStream, SocketAddr)>, ListenerError> {
        match tokio::time::timeout(timeout, self.inner.accept()).await {
            Err(_elapsed) => Ok(None),
            Ok(Ok(client)) => Ok(Some(client)),
            Ok(Err(source)) => Err(ListenerError::Accept { source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    fn loopback() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    #[tokio::test]
    async fn test_accept_times_out_without_client() {
        let listener = Listener::bind_addr(loopback()).unwrap();
        let accepted = listener
            .accept_next(Duration::from_millis(20))
            .await
            .unwrap();
        assert!(accepted.is_none());
    }

    #[tokio::test]
    async fn test_accepts_client() {
        let listener = Listener::bind_addr(loopback()).unwrap();
        let addr = listener.local_addr();
        assert_ne!(addr.port(), 0);

        let client = TcpStream::connect(addr).await.unwrap();
        let (_, peer) = listener
            .accept_next(Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_port_in_use_is_bind_error() {
        let first = Listener::bind_addr(loopback()).unwrap();
        let taken = first.local_addr();

        // SO_REUSEADDR does not allow two listeners on one port.
        let result = Listener::bind_addr(taken);
        assert!(matches!(result, Err(ListenerError::Bind { .. })));
    }

    #[test]
    fn test_error_display() {
        let err = ListenerError::Bind {
            addr: loopback(),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().contains("127.0.0.1:0"));
    }
}
