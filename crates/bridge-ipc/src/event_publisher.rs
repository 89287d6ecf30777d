//! EventPublisher: thin wrapper over a PUB socket. Implements the sink
//! traits both FeedbackReader and PluginRegistry publish through, so a
//! single socket carries both feedback and lifecycle events.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use bridge_proto::{EventEnvelope, FeedbackEvent, LifecycleEvent};
use bridge_registry::LifecycleSink;
use bridge_transport::EventSink;

pub struct EventPublisher {
    socket: Mutex<zmq::Socket>,
}

impl EventPublisher {
    pub fn bind(ctx: &zmq::Context, bind_addr: &str) -> Result<Self, zmq::Error> {
        let socket = ctx.socket(zmq::PUB)?;
        socket.bind(bind_addr)?;
        Ok(Self { socket: Mutex::new(socket) })
    }

    fn send_envelope(&self, envelope: EventEnvelope) {
        let json = match serde_json::to_string(&envelope) {
            Ok(j) => j,
            Err(e) => {
                log::warn!("event publisher: failed to serialize {} event: {e}", envelope.kind);
                return;
            }
        };
        let socket = self.socket.lock().unwrap();
        if let Err(e) = socket.send(&json, 0) {
            log::warn!("event publisher: send failed, continuing: {e}");
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

impl EventSink for EventPublisher {
    fn publish(&self, event: &FeedbackEvent) {
        self.send_envelope(EventEnvelope::from_feedback(event, now_ms()));
    }
}

impl LifecycleSink for EventPublisher {
    fn publish(&self, event: LifecycleEvent) {
        self.send_envelope(event.into_envelope(now_ms()));
    }
}
