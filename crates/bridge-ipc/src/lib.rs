//! bridge-ipc: the ZeroMQ REP/PUB surface — CommandService, HealthMonitor
//! and EventPublisher.

mod command_service;
mod event_publisher;
mod health_monitor;

pub use command_service::CommandService;
pub use event_publisher::EventPublisher;
pub use health_monitor::HealthMonitor;
