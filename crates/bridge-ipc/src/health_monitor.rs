//! HealthMonitor: dedicated REP socket answering `{"action":"health"}`,
//! bound first during boot so probes see "starting" while the orchestrator
//! waits on mod-host connectivity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};

use bridge_proto::HealthState;

const RECV_TIMEOUT_MS: i32 = 100;

pub struct HealthMonitor {
    socket: zmq::Socket,
    health: Arc<HealthState>,
    stop: Arc<AtomicBool>,
}

impl HealthMonitor {
    /// Binds the REP socket immediately; the returned monitor must still
    /// have `run()` called (typically on its own thread) to serve requests.
    pub fn bind(
        ctx: &zmq::Context,
        bind_addr: &str,
        health: Arc<HealthState>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, zmq::Error> {
        let socket = ctx.socket(zmq::REP)?;
        socket.bind(bind_addr)?;
        socket.set_rcvtimeo(RECV_TIMEOUT_MS)?;
        Ok(Self { socket, health, stop })
    }

    /// Blocking recv/reply loop. The 100ms recv timeout is the suspension
    /// point that lets this observe the shutdown flag.
    pub fn run(&self) {
        while !self.stop.load(Ordering::Relaxed) {
            match self.socket.recv_string(0) {
                Ok(Ok(msg)) => {
                    let reply = self.handle(&msg);
                    if let Err(e) = self.socket.send(&reply, 0) {
                        log::warn!("health monitor: send failed: {e}");
                    }
                }
                Ok(Err(_)) => {
                    let _ = self.socket.send(r#"{"error":"Invalid JSON format"}"#, 0);
                }
                Err(zmq::Error::EAGAIN) => {}
                Err(e) => log::warn!("health monitor: recv error: {e}"),
            }
        }
    }

    fn handle(&self, msg: &str) -> String {
        let value: Value = match serde_json::from_str(msg) {
            Ok(v) => v,
            Err(_) => return json!({"error": "Invalid JSON format"}).to_string(),
        };

        if value.get("action").and_then(Value::as_str) != Some("health") {
            return json!({"error": "Invalid health request"}).to_string();
        }

        let snap = self.health.snapshot();
        json!({
            "status": snap.status,
            "message": snap.message,
            "command_connected": snap.command_connected,
            "feedback_connected": snap.feedback_connected,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn answers_health_action_with_snapshot() {
        let ctx = zmq::Context::new();
        let health = Arc::new(HealthState::new());
        let stop = Arc::new(AtomicBool::new(false));
        let monitor = HealthMonitor::bind(&ctx, "tcp://127.0.0.1:*", health.clone(), stop.clone()).unwrap();
        let bound_endpoint = monitor.socket.get_last_endpoint().unwrap().unwrap();

        let handle = {
            let stop = stop.clone();
            thread::spawn(move || {
                monitor.run();
                let _ = stop;
            })
        };

        let client_ctx = zmq::Context::new();
        let client = client_ctx.socket(zmq::REQ).unwrap();
        client.connect(&bound_endpoint).unwrap();
        client.send(r#"{"action":"health"}"#, 0).unwrap();
        let reply = client.recv_string(0).unwrap().unwrap();
        let parsed: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["status"], "starting");

        stop.store(true, Ordering::Relaxed);
        thread::sleep(Duration::from_millis(150));
        handle.join().unwrap();
    }

    #[test]
    fn rejects_non_health_action() {
        let ctx = zmq::Context::new();
        let health = Arc::new(HealthState::new());
        let stop = Arc::new(AtomicBool::new(false));
        let monitor = HealthMonitor::bind(&ctx, "tcp://127.0.0.1:*", health, stop).unwrap();
        let reply = monitor.handle(r#"{"action":"bogus"}"#);
        assert_eq!(reply, json!({"error": "Invalid health request"}).to_string());
    }

    #[test]
    fn rejects_malformed_json() {
        let ctx = zmq::Context::new();
        let health = Arc::new(HealthState::new());
        let stop = Arc::new(AtomicBool::new(false));
        let monitor = HealthMonitor::bind(&ctx, "tcp://127.0.0.1:*", health, stop).unwrap();
        let reply = monitor.handle("not json");
        assert_eq!(reply, json!({"error": "Invalid JSON format"}).to_string());
    }
}
