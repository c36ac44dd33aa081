//! # Client Configuration
//!
//! Endpoint, timing and presentation settings for the polling client.
//! Defaults reproduce the controller's reference deployment:
//! `127.0.0.1:8888`, 5 s socket timeout, 1 s poll interval, 2 s reconnect backoff.

use std::time::Duration;

use crate::constants::{
    DEFAULT_HOST, DEFAULT_IO_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_PORT,
    DEFAULT_RECONNECT_BACKOFF, TELEMETRY_START_ADDRESS,
};
use crate::error::{ModbusError, ModbusResult};

/// Polling client settings.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use drone_modbus::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_host("10.0.0.7")
///     .with_poll_interval(Duration::from_millis(500))
///     .with_max_cycles(Some(20));
///
/// assert_eq!(config.endpoint(), "10.0.0.7:8888");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Applied to connect, send and receive
    pub io_timeout: Duration,
    /// Pause after every cycle, independent of time spent on I/O
    pub poll_interval: Duration,
    /// Pause before the single reconnect attempt
    pub reconnect_backoff: Duration,
    /// First register of the telemetry block
    pub start_address: u16,
    /// Stop after this many cycles; `None` polls until a fatal error
    pub max_cycles: Option<u64>,
    /// Clear the terminal before each dashboard refresh
    pub clear_screen: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            start_address: TELEMETRY_START_ADDRESS,
            max_cycles: None,
            clear_screen: true,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    pub fn with_start_address(mut self, address: u16) -> Self {
        self.start_address = address;
        self
    }

    pub fn with_max_cycles(mut self, cycles: Option<u64>) -> Self {
        self.max_cycles = cycles;
        self
    }

    pub fn with_clear_screen(mut self, clear: bool) -> Self {
        self.clear_screen = clear;
        self
    }

    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> ModbusResult<()> {
        if self.host.trim().is_empty() {
            return Err(ModbusError::configuration("host must not be empty"));
        }
        if self.port == 0 {
            return Err(ModbusError::configuration("port must be non-zero"));
        }
        if self.io_timeout.is_zero() {
            return Err(ModbusError::configuration("I/O timeout must be non-zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(ModbusError::configuration("poll interval must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint(), "127.0.0.1:8888");
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.reconnect_backoff, Duration::from_secs(2));
        assert_eq!(config.start_address, 0);
        assert_eq!(config.max_cycles, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new()
            .with_host("plc.local")
            .with_port(502)
            .with_io_timeout(Duration::from_millis(250))
            .with_reconnect_backoff(Duration::ZERO)
            .with_start_address(40)
            .with_clear_screen(false);

        assert_eq!(config.endpoint(), "plc.local:502");
        assert_eq!(config.start_address, 40);
        assert!(!config.clear_screen);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects() {
        let cases = [
            ClientConfig::new().with_host(" "),
            ClientConfig::new().with_port(0),
            ClientConfig::new().with_io_timeout(Duration::ZERO),
            ClientConfig::new().with_poll_interval(Duration::ZERO),
        ];
        for config in cases {
            assert!(matches!(
                config.validate(),
                Err(ModbusError::Configuration(_))
            ));
        }
    }
}
