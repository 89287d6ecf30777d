//! ModHostClient: one short-lived TCP round trip per command.
//!
//! Deliberately opens a fresh socket on every call instead of pooling a
//! connection — trades a little latency for immunity to half-open sockets,
//! and matches the protocol mod-host itself expects (NUL-terminated command,
//! NUL-terminated or EOF-terminated reply).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use bridge_proto::{HealthState, TransportError};

const READ_CHUNK: usize = 4096;

pub struct ModHostClient {
    host: String,
    port: u16,
}

impl ModHostClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Send one command and return mod-host's reply line with its trailing
    /// NUL stripped. Updates `health.command_connected` on every attempt.
    pub fn send(
        &self,
        command: &str,
        timeout: Duration,
        health: &HealthState,
    ) -> Result<String, TransportError> {
        match self.send_inner(command, timeout) {
            Ok(reply) => {
                health.update_command_connection(true);
                Ok(reply)
            }
            Err(err) => {
                health.update_command_connection(false);
                Err(err)
            }
        }
    }

    fn send_inner(&self, command: &str, timeout: Duration) -> Result<String, TransportError> {
        let addr = format!("{}:{}", self.host, self.port);
        let mut stream = TcpStream::connect(&addr).map_err(|e| match e.kind() {
            std::io::ErrorKind::ConnectionRefused => TransportError::ConnectionRefused,
            _ => TransportError::Io(e),
        })?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut payload = command.as_bytes().to_vec();
        payload.push(0);
        stream.write_all(&payload)?;

        let mut buf = [0u8; READ_CHUNK];
        let mut acc = Vec::new();
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return Err(TransportError::Timeout);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(TransportError::Timeout);
                }
                Err(e) => return Err(TransportError::Io(e)),
            };
            if let Some(pos) = buf[..n].iter().position(|&b| b == 0) {
                acc.extend_from_slice(&buf[..pos]);
                break;
            }
            acc.extend_from_slice(&buf[..n]);
            if acc.len() >= READ_CHUNK {
                break;
            }
        }

        if acc.is_empty() {
            return Err(TransportError::Closed);
        }

        Ok(String::from_utf8_lossy(&acc).into_owned())
    }
}

/// Parse mod-host's canonical `resp <int> ...` reply shape, used by every
/// caller that needs the numeric status/slot.
pub fn parse_resp_int(reply: &str) -> Option<i32> {
    let mut tokens = reply.split_whitespace();
    if tokens.next() != Some("resp") {
        return None;
    }
    tokens.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn send_receives_nul_terminated_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 64];
            let n = sock.read(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"add http://p 0\0");
            sock.write_all(b"resp 0\0").unwrap();
        });

        let client = ModHostClient::new("127.0.0.1", addr.port());
        let health = HealthState::new();
        let reply = client
            .send("add http://p 0", Duration::from_secs(1), &health)
            .unwrap();
        assert_eq!(reply, "resp 0");
        assert!(health.snapshot().command_connected);
        server.join().unwrap();
    }

    #[test]
    fn connect_refused_reports_transport_error_and_flips_health() {
        // Port 0 after a prior bind-and-drop is very likely refused; use an
        // address nothing is listening on instead of relying on that race.
        let client = ModHostClient::new("127.0.0.1", 1);
        let health = HealthState::new();
        let result = client.send("ping", Duration::from_millis(200), &health);
        assert!(result.is_err());
        assert!(!health.snapshot().command_connected);
    }

    #[test]
    fn parses_resp_int() {
        assert_eq!(parse_resp_int("resp 0"), Some(0));
        assert_eq!(parse_resp_int("resp -3"), Some(-3));
        assert_eq!(parse_resp_int("garbage"), None);
    }
}
