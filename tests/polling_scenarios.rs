//! End-to-end polling scenarios against an in-process Modbus TCP responder.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use drone_modbus::codec::encode_read_response;
use drone_modbus::{
    ClientConfig, ConnectionError, ConsoleRenderer, Connector, DecodeError, MbapHeader,
    ModbusError, PollError, Poller, RegisterBlock, Renderer, Sleeper, TcpConnector, TcpSession,
    TransactionManager,
};

const TS: u32 = 1_700_000_000;

/// Scenario A register block
const DETECTION: [u16; 10] = [
    2,
    1,
    1,
    7,
    955,
    (-500i16) as u16,
    (-500i16) as u16,
    3,
    (TS >> 16) as u16,
    (TS & 0xFFFF) as u16,
];

struct Responder {
    port: u16,
    connections: Arc<AtomicUsize>,
}

/// Accepts connections forever and answers each 12-byte request with `reply`.
fn spawn_responder<F>(reply: F) -> Responder
where
    F: Fn(&[u8; 12]) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connections);
    let reply = Arc::new(reply);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            counter.fetch_add(1, Ordering::SeqCst);
            let reply = Arc::clone(&reply);
            thread::spawn(move || {
                let mut request = [0u8; 12];
                while stream.read_exact(&mut request).is_ok() {
                    if stream.write_all(&reply(&request)).is_err() {
                        break;
                    }
                }
            });
        }
    });

    Responder { port, connections }
}

fn tid(request: &[u8; 12]) -> u16 {
    MbapHeader::parse(request).unwrap().transaction_id
}

#[derive(Default)]
struct RecordingSleeper {
    sleeps: Vec<Duration>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}

#[derive(Default)]
struct EventLog {
    blocks: Vec<(RegisterBlock, bool)>,
    failures: Vec<String>,
    connection_losses: usize,
    fatal: bool,
}

impl Renderer for EventLog {
    fn telemetry(&mut self, block: &RegisterBlock, alert: bool) {
        self.blocks.push((*block, alert));
    }

    fn read_failed(&mut self, error: &ModbusError) {
        self.failures.push(error.to_string());
    }

    fn connection_lost(&mut self, _error: &ConnectionError, _backoff: Duration) {
        self.connection_losses += 1;
    }

    fn fatal(&mut self, _error: &PollError) {
        self.fatal = true;
    }
}

/// Counts connect attempts made through an inner connector
struct CountingConnector {
    inner: TcpConnector,
    attempts: Arc<AtomicUsize>,
}

impl Connector for CountingConnector {
    type Transport = TcpSession;

    fn connect(&mut self) -> Result<TcpSession, ConnectionError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.connect()
    }

    fn endpoint(&self) -> String {
        self.inner.endpoint()
    }
}

fn config(port: u16, cycles: u64) -> ClientConfig {
    ClientConfig::new()
        .with_port(port)
        .with_io_timeout(Duration::from_secs(2))
        .with_max_cycles(Some(cycles))
        .with_clear_screen(false)
}

fn run_poller<R: Renderer>(
    port: u16,
    cycles: u64,
    renderer: R,
) -> (
    Result<drone_modbus::PollSummary, PollError>,
    Poller<TcpConnector, R, RecordingSleeper>,
) {
    let connector = TcpConnector::new("127.0.0.1", port).with_timeout(Duration::from_secs(2));
    let mut poller = Poller::with_sleeper(
        config(port, cycles),
        connector,
        renderer,
        RecordingSleeper::default(),
    );
    let result = poller.run();
    (result, poller)
}

#[test]
fn scenario_a_detection_with_fire_alert() {
    let responder = spawn_responder(|req| encode_read_response(tid(req), 0xFF, &DETECTION).to_vec());
    let (result, poller) = run_poller(responder.port, 1, EventLog::default());

    let summary = result.unwrap();
    assert_eq!(summary.successful_reads, 1);
    assert_eq!(summary.alerts, 1);
    assert_eq!(summary.stats.requests_sent, 1);
    assert_eq!(summary.stats.bytes_sent, 12);
    assert_eq!(summary.stats.bytes_received, 29);

    let (block, alert) = poller.renderer().blocks[0];
    assert!(alert);
    assert_eq!(block.drone_count(), 2);
    assert_eq!(block.threat_level(), 1);
    assert_eq!(block.fire_authorized(), 1);
    assert_eq!(block.confidence(), 955);
    assert!((block.confidence_percent() - 95.5).abs() < 1e-9);
    assert_eq!(block.zone_code(), 3);
    assert_eq!(block.timestamp(), TS);
}

#[test]
fn scenario_b_short_response_is_invalid_length() {
    let responder = spawn_responder(|req| {
        let mut frame = encode_read_response(tid(req), 0xFF, &DETECTION).to_vec();
        frame.truncate(8);
        frame
    });
    let (result, poller) = run_poller(responder.port, 2, EventLog::default());

    let summary = result.unwrap();
    assert_eq!(summary.failed_reads, 2);
    assert_eq!(summary.reconnects, 0);
    assert_eq!(responder.connections.load(Ordering::SeqCst), 1);

    let expected = ModbusError::from(DecodeError::InvalidLength {
        actual: 8,
        minimum: 9,
    })
    .to_string();
    assert_eq!(poller.renderer().failures, vec![expected.clone(), expected]);
    assert_eq!(poller.renderer().connection_losses, 0);
    assert_eq!(poller.sleeper().sleeps, vec![Duration::from_secs(1); 2]);
}

#[test]
fn scenario_c_byte_count_mismatch() {
    let responder = spawn_responder(|req| {
        let mut frame = encode_read_response(tid(req), 0xFF, &DETECTION).to_vec();
        frame[8] = 18;
        frame
    });
    let (result, poller) = run_poller(responder.port, 1, EventLog::default());

    assert_eq!(result.unwrap().failed_reads, 1);
    assert_eq!(
        poller.renderer().failures,
        vec!["Byte count mismatch: expected 20, got 18".to_string()]
    );
}

#[test]
fn scenario_d_unreachable_endpoint_retries_once() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let attempts = Arc::new(AtomicUsize::new(0));
    let connector = CountingConnector {
        inner: TcpConnector::new("127.0.0.1", port).with_timeout(Duration::from_secs(1)),
        attempts: Arc::clone(&attempts),
    };
    let mut poller = Poller::with_sleeper(
        config(port, 5),
        connector,
        EventLog::default(),
        RecordingSleeper::default(),
    );

    let err = poller.run().unwrap_err();
    let PollError::FatalReconnectFailure { endpoint, source } = err;
    assert_eq!(endpoint, format!("127.0.0.1:{}", port));
    assert!(matches!(source, ConnectionError::Connect { .. }));

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(poller.sleeper().sleeps, vec![Duration::from_secs(2)]);
    assert_eq!(poller.summary().cycles, 0);
    assert!(poller.renderer().fatal);
    assert!(!poller.is_connected());
}

#[test]
fn scenario_e_no_drones_no_alert() {
    let responder = spawn_responder(|req| encode_read_response(tid(req), 0xFF, &[0; 10]).to_vec());
    let (result, poller) = run_poller(responder.port, 1, ConsoleRenderer::new(Vec::new(), false));

    let summary = result.unwrap();
    assert_eq!(summary.alerts, 0);

    let text = String::from_utf8(poller.renderer().get_ref().clone()).unwrap();
    assert!(text.contains("NO DRONES DETECTED"));
    assert!(!text.contains("FIRE AUTHORIZATION ACTIVE"));
}

#[test]
fn exception_response_keeps_session() {
    let responder = spawn_responder(|req| {
        let mut frame = req[..9].to_vec();
        frame[5] = 3;
        frame[7] = 0x83;
        frame[8] = 0x02;
        frame
    });
    let (result, poller) = run_poller(responder.port, 1, EventLog::default());

    assert_eq!(result.unwrap().failed_reads, 1);
    assert!(poller.renderer().failures[0].contains("Illegal Data Address"));
    assert_eq!(responder.connections.load(Ordering::SeqCst), 1);
}

#[test]
fn transaction_ids_increase_across_requests() {
    let responder = spawn_responder(|req| match req[7] {
        0x06 => req.to_vec(),
        _ => encode_read_response(tid(req), 0xFF, &[tid(req); 10]).to_vec(),
    });

    let mut session =
        TcpSession::connect("127.0.0.1", responder.port, Duration::from_secs(2)).unwrap();
    let mut manager = TransactionManager::new();

    manager.issue_write(&mut session, 4, 0xBEEF).unwrap();
    let values = manager.issue_read(&mut session, 0, 10).unwrap();
    assert_eq!(values, vec![2; 10]);
    assert_eq!(manager.peek_next_id(), 3);

    drone_modbus::ModbusTransport::disconnect(&mut session);
}

#[test]
fn write_before_polling_uses_same_session() {
    let responder = spawn_responder(|req| match req[7] {
        0x06 => req.to_vec(),
        _ => encode_read_response(tid(req), 0xFF, &DETECTION).to_vec(),
    });

    let connector =
        TcpConnector::new("127.0.0.1", responder.port).with_timeout(Duration::from_secs(2));
    let mut poller = Poller::with_sleeper(
        config(responder.port, 1),
        connector,
        EventLog::default(),
        RecordingSleeper::default(),
    );

    poller.connect().unwrap();
    poller.write_register(100, 0x1234).unwrap().unwrap();
    let summary = poller.run().unwrap();

    assert_eq!(summary.successful_reads, 1);
    assert_eq!(summary.stats.requests_sent, 2);
    assert_eq!(responder.connections.load(Ordering::SeqCst), 1);
}

#[test]
fn late_write_ack_is_not_read_as_telemetry() {
    let responder = spawn_responder(|req| match req[7] {
        0x06 => {
            thread::sleep(Duration::from_millis(400));
            req.to_vec()
        }
        _ => encode_read_response(tid(req), 0xFF, &DETECTION).to_vec(),
    });

    let connector =
        TcpConnector::new("127.0.0.1", responder.port).with_timeout(Duration::from_millis(200));
    let mut poller = Poller::with_sleeper(
        config(responder.port, 1),
        connector,
        EventLog::default(),
        RecordingSleeper::default(),
    );

    poller.connect().unwrap();
    let err = poller.write_register(100, 0x1234).unwrap().unwrap_err();
    assert!(matches!(
        err,
        ModbusError::Connection(ConnectionError::Timeout(_))
    ));
    assert_eq!(poller.renderer().connection_losses, 1);
    assert_eq!(poller.summary().reconnects, 1);

    let summary = poller.run().unwrap();
    assert_eq!(summary.successful_reads, 1);
    assert_eq!(summary.failed_reads, 0);
    assert!(poller.renderer().failures.is_empty());
    assert_eq!(responder.connections.load(Ordering::SeqCst), 2);
}
