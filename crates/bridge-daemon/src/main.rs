use clap::Parser;
use env_logger::Env;

use bridge_daemon::{Config, Orchestrator};

/// CLI overrides for the environment-driven config. Every flag mirrors an
/// environment variable `Config::from_env` already reads; a flag wins over
/// its variable when both are given.
#[derive(Parser, Debug)]
#[command(name = "modhost-bridge", about = "Bridges mod-host to ZeroMQ-speaking controllers")]
struct Cli {
    /// Overrides MOD_HOST_HOST
    #[arg(long)]
    mod_host_host: Option<String>,

    /// Overrides MOD_HOST_PORT
    #[arg(long)]
    mod_host_port: Option<u16>,

    /// Overrides MOD_HOST_FEEDBACK_PORT
    #[arg(long)]
    mod_host_feedback_port: Option<u16>,

    /// Overrides MODHOST_BRIDGE_REP
    #[arg(long)]
    bridge_rep: Option<String>,

    /// Overrides MODHOST_BRIDGE_PUB
    #[arg(long)]
    bridge_pub: Option<String>,

    /// Overrides MODHOST_BRIDGE_HEALTH
    #[arg(long)]
    bridge_health: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.mod_host_host {
            config.mod_host_host = v;
        }
        if let Some(v) = self.mod_host_port {
            config.mod_host_port = v;
        }
        if let Some(v) = self.mod_host_feedback_port {
            config.mod_host_feedback_port = v;
        }
        if let Some(v) = self.bridge_rep {
            config.bridge_rep = v;
        }
        if let Some(v) = self.bridge_pub {
            config.bridge_pub = v;
        }
        if let Some(v) = self.bridge_health {
            config.bridge_health = v;
        }
    }
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("modhost_bridge=info")).init();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };
    cli.apply(&mut config);

    if let Err(e) = Orchestrator::new(config).run() {
        log::error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
