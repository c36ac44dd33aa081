//! # Drone Modbus - Telemetry Polling Client
//!
//! A Modbus TCP client that polls a drone detection controller for its
//! ten-register telemetry block and renders it as a live status view.
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`codec`] | Pure ADU encode/decode for FC03 and FC06 |
//! | [`transaction`] | Transaction ids, one round trip per call |
//! | [`transport`] | Blocking TCP session with fixed timeouts |
//! | [`poller`] | Fixed-cadence loop and reconnect policy |
//! | [`telemetry`] | Positional mapping of the register block |
//! | [`render`] | Operator-facing output |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drone_modbus::{ClientConfig, ConsoleRenderer, Poller, TcpConnector};
//!
//! let config = ClientConfig::new().with_host("127.0.0.1").with_port(8888);
//! let connector = TcpConnector::new(config.host.clone(), config.port)
//!     .with_timeout(config.io_timeout);
//! let renderer = ConsoleRenderer::stdout(config.clear_screen);
//!
//! let mut poller = Poller::new(config, connector, renderer);
//! if let Err(e) = poller.run() {
//!     eprintln!("{}", e);
//! }
//! ```

/// Protocol constants and client defaults
pub mod constants;

/// Error taxonomy
pub mod error;

/// Modbus TCP frame codec
pub mod codec;

/// Transaction id assignment and request/response correlation
pub mod transaction;

/// TCP session and connector
pub mod transport;

/// Telemetry register block
pub mod telemetry;

/// Renderer contract and console dashboard
pub mod render;

/// Polling driver
pub mod poller;

/// Client configuration
pub mod config;

/// Subscriber setup for the binary
#[cfg(feature = "cli")]
pub mod logging;

pub use codec::{
    decode_read_response, decode_write_ack, decode_write_response, encode_read_request,
    encode_write_request, FunctionCode, MbapHeader,
};
pub use config::ClientConfig;
pub use error::{ConnectionError, DecodeError, ModbusError, ModbusResult, PollError};
pub use poller::{CycleOutcome, PollSummary, Poller, Sleeper, ThreadSleeper};
pub use render::{ConsoleRenderer, Renderer};
pub use telemetry::{RegisterBlock, ThreatLevel, Zone};
pub use transaction::{Request, Transaction, TransactionManager};
pub use transport::{
    Connector, ModbusTransport, SessionState, TcpConnector, TcpSession, TransportStats,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
