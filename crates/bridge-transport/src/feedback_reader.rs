//! FeedbackReader: the long-lived, reconnecting reader on mod-host's
//! feedback socket.
//!
//! Runs on its own thread (see bridge-daemon::Orchestrator). Every
//! suspension point — the 100ms socket read timeout, the idle-wakeup sleep,
//! and the backoff sleep — checks the shared stop flag, so shutdown is
//! observed within 100ms as required by the concurrency model.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};

use bridge_proto::{FeedbackEvent, FeedbackParser, HealthState};

const READ_CHUNK: usize = 4096;
const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const IDLE_SLEEP: Duration = Duration::from_millis(10);
const BACKOFF_START: Duration = Duration::from_millis(100);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

const KEEPALIVE_IDLE: Duration = Duration::from_secs(10);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);
const KEEPALIVE_RETRIES: u32 = 3;

/// Receives parsed feedback events. Implemented by bridge-ipc's
/// EventPublisher; kept as a trait here so this crate never depends on the
/// IPC transport.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &FeedbackEvent);
}

pub struct FeedbackReader<S: EventSink> {
    host: String,
    port: u16,
    health: Arc<HealthState>,
    sink: Arc<S>,
    stop: Arc<AtomicBool>,
}

impl<S: EventSink> FeedbackReader<S> {
    pub fn new(host: impl Into<String>, port: u16, health: Arc<HealthState>, sink: Arc<S>, stop: Arc<AtomicBool>) -> Self {
        Self { host: host.into(), port, health, sink, stop }
    }

    /// Blocking run loop: connect, read, reconnect with exponential
    /// backoff, forever, until the stop flag is set.
    pub fn run(&self) {
        let mut backoff = BACKOFF_START;

        while !self.stop.load(Ordering::Relaxed) {
            match self.connect() {
                Ok(stream) => {
                    backoff = BACKOFF_START;
                    self.health.update_feedback_connection(true);
                    log::info!("feedback: connected to {}:{}", self.host, self.port);
                    self.read_loop(stream);
                    self.health.update_feedback_connection(false);
                    log::warn!("feedback: disconnected, will retry");
                }
                Err(err) => {
                    self.health.update_feedback_connection(false);
                    log::warn!("feedback: connect failed ({err}), retrying in {backoff:?}");
                    self.sleep_with_stop_check(backoff);
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
            }
        }
    }

    fn connect(&self) -> std::io::Result<TcpStream> {
        let addr_str = format!("{}:{}", self.host, self.port);
        let mut addrs: Vec<_> = addr_str.to_socket_addrs()?.collect();
        // Prefer IPv4.
        addrs.sort_by_key(|a| !a.is_ipv4());

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(RECV_TIMEOUT))?;
                    stream.set_nodelay(true)?;
                    let sock_ref = SockRef::from(&stream);
                    let keepalive = TcpKeepalive::new()
                        .with_time(KEEPALIVE_IDLE)
                        .with_interval(KEEPALIVE_INTERVAL);
                    #[cfg(not(any(target_os = "windows", target_os = "openbsd")))]
                    let keepalive = keepalive.with_retries(KEEPALIVE_RETRIES);
                    let _ = sock_ref.set_tcp_keepalive(&keepalive);
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved")
        }))
    }

    fn read_loop(&self, mut stream: TcpStream) {
        let mut buf = [0u8; READ_CHUNK];
        let mut acc: Vec<u8> = Vec::new();

        while !self.stop.load(Ordering::Relaxed) {
            match stream.read(&mut buf) {
                Ok(0) => return, // peer closed
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if byte == 0 {
                            self.flush_record(&mut acc);
                        } else {
                            acc.push(byte);
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    self.sleep_with_stop_check(IDLE_SLEEP);
                }
                Err(e) => {
                    log::warn!("feedback: read error: {e}");
                    return;
                }
            }
        }
    }

    fn flush_record(&self, acc: &mut Vec<u8>) {
        if acc.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(acc).into_owned();
        acc.clear();
        let event = FeedbackParser::parse(&line);
        self.sink.publish(&event);
    }

    fn sleep_with_stop_check(&self, duration: Duration) {
        let step = Duration::from_millis(20).min(duration);
        let mut slept = Duration::ZERO;
        while slept < duration && !self.stop.load(Ordering::Relaxed) {
            std::thread::sleep(step);
            slept += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::net::TcpListener;
    use std::sync::Mutex;
    use std::thread;

    struct CollectingSink {
        events: Mutex<Vec<FeedbackEvent>>,
    }

    impl EventSink for CollectingSink {
        fn publish(&self, event: &FeedbackEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn reassembles_records_split_across_reads() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            sock.write_all(b"audio_mon").unwrap();
            std::thread::sleep(Duration::from_millis(20));
            sock.write_all(b"itor 1 0.5\0").unwrap();
            std::thread::sleep(Duration::from_millis(50));
        });

        let health = Arc::new(HealthState::new());
        let sink = Arc::new(CollectingSink { events: Mutex::new(Vec::new()) });
        let stop = Arc::new(AtomicBool::new(false));
        let reader = Arc::new(FeedbackReader::new(
            "127.0.0.1",
            addr.port(),
            health,
            sink.clone(),
            stop.clone(),
        ));

        let stream = reader.connect().unwrap();
        let handle = {
            let reader = reader.clone();
            thread::spawn(move || reader.read_loop(stream))
        };

        thread::sleep(Duration::from_millis(150));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();
        server.join().unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], FeedbackEvent::AudioMonitor { index: 1, value: 0.5 });
    }

    #[test]
    fn empty_records_are_ignored() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            sock.write_all(b"\0\0data_finish\0").unwrap();
            std::thread::sleep(Duration::from_millis(50));
        });

        let health = Arc::new(HealthState::new());
        let sink = Arc::new(CollectingSink { events: Mutex::new(Vec::new()) });
        let stop = Arc::new(AtomicBool::new(false));
        let reader = FeedbackReader::new("127.0.0.1", addr.port(), health, sink.clone(), stop.clone());
        let stream = reader.connect().unwrap();
        let handle = thread::spawn(move || reader.read_loop(stream));

        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();
        server.join().unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], FeedbackEvent::DataFinish);
    }
}
