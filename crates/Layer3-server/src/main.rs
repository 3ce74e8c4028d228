//! iotaskd - HTTP service for long-running background tasks

mod api;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use iotask_foundation::{Environment, ServiceConfig};
use iotask_task::{InMemoryTaskStore, SimulatedExecutor, TaskManager, TaskManagerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// iotask daemon - register, inspect, cancel and delete background tasks
#[derive(Parser, Debug)]
#[command(name = "iotaskd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON config file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    address: Option<String>,

    /// Environment (local, dev, prod), overrides the config file
    #[arg(short, long, value_parser = parse_env)]
    env: Option<Environment>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn parse_env(s: &str) -> Result<Environment, String> {
    Environment::parse(s).ok_or_else(|| format!("unknown environment '{}'", s))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref())?;
    if let Some(address) = args.address {
        config = config.address(address);
    }
    if let Some(env) = args.env {
        config = config.env(env);
    }
    config.validate()?;

    init_tracing(config.env, args.debug);
    tracing::info!(
        env = config.env.as_str(),
        address = %config.server.address,
        "Starting iotaskd"
    );

    let manager = TaskManager::new(
        Arc::new(InMemoryTaskStore::new()),
        Arc::new(SimulatedExecutor::from_config(&config.executor)),
        TaskManagerConfig::from_config(&config.lifecycle),
    );

    api::serve(&config, manager.clone()).await?;

    if let Err(e) = manager.shutdown(config.server.shutdown_timeout()).await {
        tracing::warn!("Shutdown incomplete: {}", e);
    }
    tracing::info!("iotaskd stopped");
    Ok(())
}

/// Text logs for local/dev, JSON for prod. RUST_LOG takes precedence.
fn init_tracing(env: Environment, debug: bool) {
    let level = if debug { "debug" } else { env.default_log_level() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if env.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}
