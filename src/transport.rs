//! Connection session for Modbus TCP
//!
//! A [`TcpSession`] owns exactly one blocking socket. The Transaction Manager
//! talks to it through the [`ModbusTransport`] trait, and the polling driver
//! creates new sessions through a [`Connector`], so both can be replaced with
//! in-memory doubles in tests.
//!
//! ```text
//!               connect() ok
//! Disconnected ─────────────▶ Connected
//!      ▲                          │
//!      └──────── disconnect() ────┘
//! ```

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::constants::DEFAULT_IO_TIMEOUT;
use crate::error::ConnectionError;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
}

/// Traffic counters for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub requests_sent: u64,
    pub responses_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl TransportStats {
    /// Sum two counters, used to carry totals across reconnects
    pub fn merge(self, other: TransportStats) -> TransportStats {
        TransportStats {
            requests_sent: self.requests_sent + other.requests_sent,
            responses_received: self.responses_received + other.responses_received,
            bytes_sent: self.bytes_sent + other.bytes_sent,
            bytes_received: self.bytes_received + other.bytes_received,
        }
    }
}

/// Synchronous request/response byte transport.
pub trait ModbusTransport {
    /// Write the whole frame in one call. A short write is an error.
    fn send(&mut self, frame: &[u8]) -> Result<(), ConnectionError>;

    /// Block until some bytes arrive or the timeout elapses.
    ///
    /// Zero bytes is a valid result and is left to the decoder to reject.
    fn receive(&mut self, max_bytes: usize) -> Result<Bytes, ConnectionError>;

    /// Close the connection. Safe to call repeatedly.
    fn disconnect(&mut self);

    fn state(&self) -> SessionState;

    fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    fn stats(&self) -> TransportStats;
}

/// Factory for fresh sessions, used for the initial connect and every reconnect.
pub trait Connector {
    type Transport: ModbusTransport;

    fn connect(&mut self) -> Result<Self::Transport, ConnectionError>;

    /// `host:port` for messages
    fn endpoint(&self) -> String;
}

/// Blocking TCP session with fixed send/receive timeouts
#[derive(Debug)]
pub struct TcpSession {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    timeout: Duration,
    stats: TransportStats,
}

impl TcpSession {
    /// Resolve `host:port`, connect with `timeout`, and apply the same timeout
    /// to every subsequent send and receive.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, ConnectionError> {
        let endpoint = format!("{}:{}", host, port);
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| ConnectionError::Resolve {
                endpoint: endpoint.clone(),
                source,
            })?
            .collect();

        let mut last_err = std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "no addresses resolved",
        );

        for addr in addrs {
            debug!("Connecting to {} (timeout {:?})", addr, timeout);
            match Self::open(addr, timeout) {
                Ok(stream) => {
                    info!("Connected to {}", addr);
                    return Ok(Self {
                        stream: Some(stream),
                        peer: addr,
                        timeout,
                        stats: TransportStats::default(),
                    });
                }
                Err(err) => {
                    debug!("Connect to {} failed: {}", addr, err);
                    last_err = err;
                }
            }
        }

        Err(ConnectionError::Connect {
            endpoint,
            source: last_err,
        })
    }

    fn open(addr: SocketAddr, timeout: Duration) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// Remote address this session was opened against
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ModbusTransport for TcpSession {
    fn send(&mut self, frame: &[u8]) -> Result<(), ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::NotConnected)?;

        let written = stream
            .write(frame)
            .map_err(|e| ConnectionError::from_io(e, self.timeout, true))?;
        if written != frame.len() {
            return Err(ConnectionError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }

        self.stats.requests_sent += 1;
        self.stats.bytes_sent += written as u64;
        debug!("-> {} bytes: {:02X?}", written, frame);
        Ok(())
    }

    fn receive(&mut self, max_bytes: usize) -> Result<Bytes, ConnectionError> {
        let stream = self.stream.as_mut().ok_or(ConnectionError::NotConnected)?;

        let mut buf = vec![0u8; max_bytes];
        let received = stream
            .read(&mut buf)
            .map_err(|e| ConnectionError::from_io(e, self.timeout, false))?;
        buf.truncate(received);

        self.stats.responses_received += 1;
        self.stats.bytes_received += received as u64;
        debug!("<- {} bytes: {:02X?}", received, buf);
        Ok(Bytes::from(buf))
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                // Peer may already have closed its side.
                debug!("Shutdown of {} reported: {}", self.peer, e);
            }
            info!("Disconnected from {}", self.peer);
        }
    }

    fn state(&self) -> SessionState {
        if self.stream.is_some() {
            SessionState::Connected
        } else {
            SessionState::Disconnected
        }
    }

    fn stats(&self) -> TransportStats {
        self.stats
    }
}

impl Drop for TcpSession {
    fn drop(&mut self) {
        if self.stream.is_some() {
            warn!("Session to {} dropped while connected, closing", self.peer);
            self.disconnect();
        }
    }
}

/// Opens [`TcpSession`]s against a fixed endpoint
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Connector for TcpConnector {
    type Transport = TcpSession;

    fn connect(&mut self) -> Result<TcpSession, ConnectionError> {
        TcpSession::connect(&self.host, self.port, self.timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
