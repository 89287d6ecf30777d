//! PUB-socket event envelope and lifecycle event payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::feedback::FeedbackEvent;

/// `{ "type": <string>, "timestamp": <ms since epoch>, "data": <any> }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: u64,
    pub data: Value,
}

impl EventEnvelope {
    pub fn new(kind: impl Into<String>, data: Value, timestamp_ms: u64) -> Self {
        Self { kind: kind.into(), timestamp: timestamp_ms, data }
    }

    /// Build the envelope for a parsed feedback event.
    pub fn from_feedback(event: &FeedbackEvent, timestamp_ms: u64) -> Self {
        let data = serde_json::to_value(event).unwrap_or(Value::Null);
        // FeedbackEvent serializes as {"type": ..., "data": ...}; unwrap the
        // inner "data" field so the envelope's own `data` holds the payload
        // directly rather than double-nesting it.
        let inner = data.get("data").cloned().unwrap_or(data);
        Self::new(event.type_tag(), inner, timestamp_ms)
    }
}

/// The four lifecycle events emitted by PluginRegistry mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LifecycleEvent {
    PluginLoaded {
        instance_id: String,
        uri: String,
        host_instance: i32,
    },
    PluginUnloaded {
        instance_id: String,
    },
    ParameterChanged {
        instance_id: String,
        symbol: String,
        value: f64,
    },
    PluginsRescanned {
        count: usize,
    },
}

impl LifecycleEvent {
    pub fn type_tag(&self) -> &'static str {
        match self {
            LifecycleEvent::PluginLoaded { .. } => "plugin_loaded",
            LifecycleEvent::PluginUnloaded { .. } => "plugin_unloaded",
            LifecycleEvent::ParameterChanged { .. } => "parameter_changed",
            LifecycleEvent::PluginsRescanned { .. } => "plugins_rescanned",
        }
    }

    pub fn into_envelope(self, timestamp_ms: u64) -> EventEnvelope {
        let data = serde_json::to_value(&self).unwrap_or(Value::Null);
        let inner = data.get("data").cloned().unwrap_or(data);
        EventEnvelope::new(self.type_tag(), inner, timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_envelope_unwraps_tagged_payload() {
        let event = FeedbackEvent::AudioMonitor { index: 1, value: 0.5 };
        let envelope = EventEnvelope::from_feedback(&event, 1000);
        assert_eq!(envelope.kind, "audio_monitor");
        assert_eq!(envelope.data["index"], 1);
        assert_eq!(envelope.data["value"], 0.5);
    }

    #[test]
    fn lifecycle_event_envelope_round_trips() {
        let event = LifecycleEvent::PluginLoaded {
            instance_id: "plugin_0_aaaaaaaa".into(),
            uri: "http://p".into(),
            host_instance: 0,
        };
        let envelope = event.into_envelope(42);
        assert_eq!(envelope.kind, "plugin_loaded");
        assert_eq!(envelope.timestamp, 42);
        assert_eq!(envelope.data["host_instance"], 0);
    }
}
