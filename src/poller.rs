//! Polling driver
//!
//! Runs the read → validate → render cycle at a fixed cadence and owns the
//! reconnect policy:
//!
//! - decode failures are reported and the session is kept;
//! - a connection failure closes the session, waits the backoff and tries
//!   exactly one reconnect; if that fails polling stops with
//!   [`PollError::FatalReconnectFailure`];
//! - every cycle ends with a full `poll_interval` sleep.
//!
//! Sleeping goes through the [`Sleeper`] trait so tests can run the loop
//! without real delays.

use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::constants::TELEMETRY_REGISTER_COUNT;
use crate::error::{ConnectionError, ModbusError, ModbusResult, PollError};
use crate::render::Renderer;
use crate::telemetry::RegisterBlock;
use crate::transaction::TransactionManager;
use crate::transport::{Connector, ModbusTransport, TransportStats};

/// Blocking pause between cycles and before reconnects
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Result of a single polling cycle
#[derive(Debug)]
pub enum CycleOutcome {
    Telemetry { block: RegisterBlock, alert: bool },
    /// Response unusable, session still healthy
    ReadFailed(ModbusError),
    /// Session must be torn down
    ConnectionLost(ConnectionError),
}

/// Counters accumulated over a polling run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub cycles: u64,
    pub successful_reads: u64,
    pub failed_reads: u64,
    pub reconnects: u64,
    pub alerts: u64,
    /// Traffic over every session of the run
    pub stats: TransportStats,
}

/// Drives the telemetry poll over sessions produced by a [`Connector`]
pub struct Poller<C: Connector, R: Renderer, S: Sleeper = ThreadSleeper> {
    config: ClientConfig,
    connector: C,
    renderer: R,
    sleeper: S,
    transactions: TransactionManager,
    session: Option<C::Transport>,
    summary: PollSummary,
}

impl<C: Connector, R: Renderer> Poller<C, R, ThreadSleeper> {
    pub fn new(config: ClientConfig, connector: C, renderer: R) -> Self {
        Self::with_sleeper(config, connector, renderer, ThreadSleeper)
    }
}

impl<C: Connector, R: Renderer, S: Sleeper> Poller<C, R, S> {
    pub fn with_sleeper(config: ClientConfig, connector: C, renderer: R, sleeper: S) -> Self {
        Self {
            config,
            connector,
            renderer,
            sleeper,
            transactions: TransactionManager::new(),
            session: None,
            summary: PollSummary::default(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn summary(&self) -> PollSummary {
        self.summary
    }

    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_connected())
    }

    /// Open the session if none is live.
    ///
    /// The initial connect gets the same policy as a lost connection:
    /// one backoff, one retry, then a fatal error.
    pub fn connect(&mut self) -> Result<(), PollError> {
        if self.is_connected() {
            return Ok(());
        }
        self.shutdown();

        match self.connector.connect() {
            Ok(session) => {
                self.install(session);
                Ok(())
            }
            Err(err) => {
                warn!("Connect to {} failed: {}", self.connector.endpoint(), err);
                self.renderer
                    .connection_lost(&err, self.config.reconnect_backoff);
                self.reconnect()
            }
        }
    }

    /// Issue a single register write on the live session.
    ///
    /// The inner result is the write itself. A connection failure closes the
    /// session and goes through the reconnect policy; the outer error means
    /// that reconnect failed too.
    pub fn write_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> Result<ModbusResult<()>, PollError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(Err(ConnectionError::NotConnected.into()));
        };

        match self.transactions.issue_write(session, address, value) {
            Ok(()) => {
                info!("Wrote register {} = {}", address, value);
                Ok(Ok(()))
            }
            Err(ModbusError::Connection(err)) => {
                warn!("Write of register {} lost the connection: {}", address, err);
                self.renderer
                    .connection_lost(&err, self.config.reconnect_backoff);
                self.shutdown();
                self.reconnect()?;
                Ok(Err(err.into()))
            }
            Err(err) => {
                warn!("Write of register {} failed: {}", address, err);
                Ok(Err(err))
            }
        }
    }

    /// Read the telemetry block once and classify the result.
    pub fn poll_once(&mut self) -> CycleOutcome {
        let Some(session) = self.session.as_mut() else {
            return CycleOutcome::ConnectionLost(ConnectionError::NotConnected);
        };

        match self.transactions.issue_read(
            session,
            self.config.start_address,
            TELEMETRY_REGISTER_COUNT,
        ) {
            Ok(values) => match RegisterBlock::try_from(values.as_slice()) {
                Ok(block) => CycleOutcome::Telemetry {
                    alert: block.fire_alert(),
                    block,
                },
                Err(err) => CycleOutcome::ReadFailed(err.into()),
            },
            Err(ModbusError::Connection(err)) => CycleOutcome::ConnectionLost(err),
            Err(err) => CycleOutcome::ReadFailed(err),
        }
    }

    /// Poll until `max_cycles` is reached or a reconnect fails.
    ///
    /// The session is closed on every exit path.
    pub fn run(&mut self) -> Result<PollSummary, PollError> {
        let result = self.run_cycles();
        self.shutdown();
        info!(
            "Polling stopped after {} cycles ({} ok, {} failed, {} reconnects)",
            self.summary.cycles,
            self.summary.successful_reads,
            self.summary.failed_reads,
            self.summary.reconnects
        );
        result.map(|_| self.summary)
    }

    /// Close the live session, if any.
    pub fn shutdown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.disconnect();
            self.summary.stats = self.summary.stats.merge(session.stats());
        }
    }

    fn run_cycles(&mut self) -> Result<(), PollError> {
        self.connect()?;

        loop {
            if let Some(max) = self.config.max_cycles {
                if self.summary.cycles >= max {
                    return Ok(());
                }
            }
            self.summary.cycles += 1;
            debug!("Cycle {}", self.summary.cycles);

            match self.poll_once() {
                CycleOutcome::Telemetry { block, alert } => {
                    self.summary.successful_reads += 1;
                    if alert {
                        self.summary.alerts += 1;
                        warn!(
                            "Fire authorization active: {} drone(s), detection D{:03}",
                            block.drone_count(),
                            block.detection_id()
                        );
                    }
                    self.renderer.telemetry(&block, alert);
                }
                CycleOutcome::ReadFailed(err) => {
                    self.summary.failed_reads += 1;
                    warn!("Read failed: {}", err);
                    self.renderer.read_failed(&err);
                }
                CycleOutcome::ConnectionLost(err) => {
                    self.summary.failed_reads += 1;
                    warn!("Connection lost: {}", err);
                    self.renderer
                        .connection_lost(&err, self.config.reconnect_backoff);
                    self.shutdown();
                    self.reconnect()?;
                }
            }

            self.sleeper.sleep(self.config.poll_interval);
        }
    }

    fn reconnect(&mut self) -> Result<(), PollError> {
        self.sleeper.sleep(self.config.reconnect_backoff);

        match self.connector.connect() {
            Ok(session) => {
                self.summary.reconnects += 1;
                self.install(session);
                Ok(())
            }
            Err(source) => {
                let err = PollError::FatalReconnectFailure {
                    endpoint: self.connector.endpoint(),
                    source,
                };
                error!("{}", err);
                self.renderer.fatal(&err);
                Err(err)
            }
        }
    }

    fn install(&mut self, session: C::Transport) {
        let endpoint = self.connector.endpoint();
        info!("Session established with {}", endpoint);
        self.renderer.connected(&endpoint);
        self.session = Some(session);
    }
}
