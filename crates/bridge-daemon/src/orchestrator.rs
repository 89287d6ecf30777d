//! Orchestrator: the strict boot sequence and ordered shutdown.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use signal_hook::consts::{SIGINT, SIGTERM};

use bridge_ipc::{CommandService, EventPublisher, HealthMonitor};
use bridge_proto::HealthState;
use bridge_registry::{AudioSystemAdapter, FsDiscoveryProvider, NullAudioSystemProvider, PluginCatalog, PluginRegistry};
use bridge_transport::{FeedbackReader, ModHostClient};

use crate::config::Config;

const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const TCP_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the bridge to completion: install signal handlers, wait for
    /// mod-host, wire every component, serve until shutdown, then tear down
    /// in reverse start order.
    pub fn run(self) -> anyhow::Result<()> {
        let stop = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGINT, stop.clone())?;
        signal_hook::flag::register(SIGTERM, stop.clone())?;

        let health = Arc::new(HealthState::new());
        let ctx = zmq::Context::new();

        let health_monitor = HealthMonitor::bind(&ctx, &self.config.bridge_health, health.clone(), stop.clone())
            .map_err(|e| anyhow::anyhow!("failed to bind health REP socket at {}: {e}", self.config.bridge_health))?;
        let health_handle = thread::spawn(move || health_monitor.run());

        log::info!("waiting for mod-host at {}:{}", self.config.mod_host_host, self.config.mod_host_port);
        self.wait_for_mod_host(&health, &stop);

        if stop.load(Ordering::Relaxed) {
            log::info!("shutdown requested during boot, tearing down");
            let _ = health_handle.join();
            return Ok(());
        }
        log::info!("mod-host reachable, continuing boot");

        let client = Arc::new(ModHostClient::new(self.config.mod_host_host.clone(), self.config.mod_host_port));
        let publisher = Arc::new(
            EventPublisher::bind(&ctx, &self.config.bridge_pub)
                .map_err(|e| anyhow::anyhow!("failed to bind event PUB socket at {}: {e}", self.config.bridge_pub))?,
        );

        let discovery = Box::new(FsDiscoveryProvider::new(self.config.lv2_paths.clone()));
        let catalog = PluginCatalog::new(discovery);
        let registry = PluginRegistry::new(
            catalog,
            client.clone(),
            health.clone(),
            publisher.clone(),
            self.config.lv2_paths.clone(),
            self.config.bundle_watch_interval,
        );
        let audio = Arc::new(AudioSystemAdapter::new(Box::new(NullAudioSystemProvider::new())));

        let count = registry.initialize();
        log::info!("catalog scan admitted {count} plugins");

        let feedback_reader = Arc::new(FeedbackReader::new(
            self.config.mod_host_host.clone(),
            self.config.mod_host_feedback_port,
            health.clone(),
            publisher.clone(),
            stop.clone(),
        ));
        let feedback_handle = {
            let reader = feedback_reader.clone();
            thread::spawn(move || reader.run())
        };

        let command_service = CommandService::bind(
            &ctx,
            &self.config.bridge_rep,
            client,
            health,
            registry.clone(),
            audio,
            stop.clone(),
        )
        .map_err(|e| anyhow::anyhow!("failed to bind command REP socket at {}: {e}", self.config.bridge_rep))?;
        let command_handle = thread::spawn(move || command_service.run());

        while !stop.load(Ordering::Relaxed) {
            thread::sleep(SHUTDOWN_POLL_INTERVAL);
        }

        log::info!("shutdown: stopping feedback reader");
        let _ = feedback_handle.join();
        log::info!("shutdown: stopping command service");
        let _ = command_handle.join();
        log::info!("shutdown: stopping health monitor");
        let _ = health_handle.join();
        log::info!("shutdown: stopping registry");
        registry.shutdown();

        Ok(())
    }

    /// Polls both mod-host ports with 1s retries until both succeed or the
    /// shutdown flag is set. Updates HealthState on every attempt.
    fn wait_for_mod_host(&self, health: &HealthState, stop: &AtomicBool) {
        loop {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            let command_ok = tcp_reachable(&self.config.mod_host_host, self.config.mod_host_port);
            health.update_command_connection(command_ok);
            let feedback_ok = tcp_reachable(&self.config.mod_host_host, self.config.mod_host_feedback_port);
            health.update_feedback_connection(feedback_ok);

            if command_ok && feedback_ok {
                return;
            }
            sleep_with_stop_check(BOOT_POLL_INTERVAL, stop);
        }
    }
}

fn tcp_reachable(host: &str, port: u16) -> bool {
    let addr = format!("{host}:{port}");
    match addr.to_socket_addrs() {
        Ok(mut addrs) => addrs.any(|a| TcpStream::connect_timeout(&a, TCP_PROBE_TIMEOUT).is_ok()),
        Err(_) => false,
    }
}

fn sleep_with_stop_check(duration: Duration, stop: &AtomicBool) {
    let step = Duration::from_millis(100).min(duration);
    let mut slept = Duration::ZERO;
    while slept < duration && !stop.load(Ordering::Relaxed) {
        thread::sleep(step);
        slept += step;
    }
}
