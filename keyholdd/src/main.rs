mod bootstrap;
mod serve;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use keyhold_agent::Agent;
use keyhold_core::config::Config;
use keyhold_store::{DirStore, KeyProtector};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Hardening first: after logging is up (so warnings are visible), before
    // any key material exists in this address space.
    bootstrap::secure_bootstrap();

    let config_path = parse_config_path();
    let config = Config::load(&config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    tracing::info!(config = %config_path.display(), "configuration loaded");

    let store_root = config.store_root()?;
    let machine_key_path = config.machine_key_path()?;
    let socket_path = config.socket_path()?;

    let store = Arc::new(DirStore::new(&store_root));
    let protector = Arc::new(
        KeyProtector::open(&machine_key_path).with_context(|| {
            format!("open machine key {}", machine_key_path.display())
        })?,
    );
    let agent = Arc::new(Agent::new(store, protector));

    tracing::info!(store = %store_root.display(), "credential store ready");

    tokio::select! {
        result = serve::listen(&socket_path, agent) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}

/// `keyholdd [--config <path>]`; default: `$XDG_CONFIG_HOME/keyhold/config.toml`.
fn parse_config_path() -> PathBuf {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return PathBuf::from(path);
        }
    }

    let base = if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".config")
    } else {
        PathBuf::from("/etc")
    };
    base.join("keyhold").join("config.toml")
}
