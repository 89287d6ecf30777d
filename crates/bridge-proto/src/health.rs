//! HealthState: aggregates command/feedback connectivity into the four
//! level status the health endpoint reports.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Starting,
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    fn from_flags(command_connected: bool, feedback_connected: bool, started: bool) -> Self {
        if !started {
            return HealthStatus::Starting;
        }
        match (command_connected, feedback_connected) {
            (true, true) => HealthStatus::Healthy,
            (true, false) => HealthStatus::Degraded,
            (false, _) => HealthStatus::Unhealthy,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            HealthStatus::Starting => "waiting for mod-host connections",
            HealthStatus::Healthy => "all connections established",
            HealthStatus::Degraded => "command ok, feedback lost",
            HealthStatus::Unhealthy => "cannot connect to mod-host",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub message: String,
    pub command_connected: bool,
    pub feedback_connected: bool,
}

const LOG_THROTTLE: Duration = Duration::from_secs(30);

struct Inner {
    status: HealthStatus,
    command_connected: bool,
    feedback_connected: bool,
    /// Whether either link has completed its first connection attempt.
    started: bool,
    last_log: Option<Instant>,
}

/// Shared by CommandService (via ModHostClient), FeedbackReader and
/// HealthMonitor. All mutation goes through `update_*`, which recomputes
/// `status` and throttles repeat-state logging to once per 30s.
pub struct HealthState {
    inner: Mutex<Inner>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: HealthStatus::Starting,
                command_connected: false,
                feedback_connected: false,
                started: false,
                last_log: None,
            }),
        }
    }

    pub fn update_command_connection(&self, connected: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.command_connected = connected;
        inner.started = true;
        Self::recompute(&mut inner);
    }

    pub fn update_feedback_connection(&self, connected: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.feedback_connected = connected;
        inner.started = true;
        Self::recompute(&mut inner);
    }

    fn recompute(inner: &mut Inner) {
        let new_status =
            HealthStatus::from_flags(inner.command_connected, inner.feedback_connected, inner.started);
        let transitioned = new_status != inner.status;
        let should_log = transitioned
            || inner
                .last_log
                .map(|t| t.elapsed() >= LOG_THROTTLE)
                .unwrap_or(true);

        if should_log {
            if transitioned {
                log::info!(
                    "health: {:?} -> {:?} ({})",
                    inner.status,
                    new_status,
                    new_status.message()
                );
            } else {
                log::debug!("health: still {:?} ({})", new_status, new_status.message());
            }
            inner.last_log = Some(Instant::now());
        }
        inner.status = new_status;
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let inner = self.inner.lock().unwrap();
        HealthSnapshot {
            status: inner.status,
            message: inner.status.message().to_string(),
            command_connected: inner.command_connected,
            feedback_connected: inner.feedback_connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_starting_state() {
        let health = HealthState::new();
        let snap = health.snapshot();
        assert_eq!(snap.status, HealthStatus::Starting);
        assert!(!snap.command_connected);
        assert!(!snap.feedback_connected);
    }

    #[test]
    fn healthy_requires_both_links() {
        let health = HealthState::new();
        health.update_command_connection(true);
        assert_eq!(health.snapshot().status, HealthStatus::Degraded);
        health.update_feedback_connection(true);
        assert_eq!(health.snapshot().status, HealthStatus::Healthy);
    }

    #[test]
    fn losing_feedback_degrades_from_healthy() {
        let health = HealthState::new();
        health.update_command_connection(true);
        health.update_feedback_connection(true);
        health.update_feedback_connection(false);
        assert_eq!(health.snapshot().status, HealthStatus::Degraded);
    }

    #[test]
    fn losing_command_is_unhealthy_regardless_of_feedback() {
        let health = HealthState::new();
        health.update_command_connection(true);
        health.update_feedback_connection(true);
        health.update_command_connection(false);
        assert_eq!(health.snapshot().status, HealthStatus::Unhealthy);
    }

    #[test]
    fn status_is_pure_function_of_flag_pair() {
        for &(cmd, fb) in &[(true, true), (true, false), (false, true), (false, false)] {
            let health = HealthState::new();
            health.update_command_connection(cmd);
            health.update_feedback_connection(fb);
            let expected = if !cmd {
                HealthStatus::Unhealthy
            } else if fb {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            };
            assert_eq!(health.snapshot().status, expected);
        }
    }

    #[test]
    fn messages_match_status() {
        assert_eq!(
            HealthStatus::Starting.message(),
            "waiting for mod-host connections"
        );
        assert_eq!(HealthStatus::Healthy.message(), "all connections established");
        assert_eq!(HealthStatus::Degraded.message(), "command ok, feedback lost");
        assert_eq!(HealthStatus::Unhealthy.message(), "cannot connect to mod-host");
    }
}
