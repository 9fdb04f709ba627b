use std::{env, path::Path, sync::Arc};

use anyhow::Context;
use release_controller::config::AppConfig;
use release_controller::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use release_controller::{Controller, bootstrap, release_indexes};
use release_core::events::EventBroadcaster;
use release_storage::{DynStore, EventedStore};
use release_store_memory::MemoryStore;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From RELEASE_SERVICE_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (release-service.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (RELEASE_SERVICE_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    release_controller::observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );
    release_controller::observability::apply_logging_level(&cfg.logging.level);

    if let Err(err) = run(cfg).await {
        eprintln!("Controller error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let broadcaster = Arc::new(EventBroadcaster::with_capacity(cfg.controller.event_capacity));
    let store: DynStore = Arc::new(EventedStore::new(
        MemoryStore::with_indexes(release_indexes()),
        broadcaster.clone(),
    ));

    // Subscribe before seeding so no Release creation is missed.
    let receiver = broadcaster.subscribe();

    if let Some(dir) = &cfg.bootstrap.seed_dir {
        bootstrap::load_seed_dir(&store, Path::new(dir))
            .await
            .with_context(|| format!("seeding from {dir}"))?;
    }

    let controller = Controller::new(store, &cfg.controller);
    let queued = controller
        .resync()
        .await
        .context("listing Releases at startup")?;
    tracing::info!(queued, "Initial Releases queued");

    let handle = controller.start(receiver);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    handle.shutdown().await;
    Ok(())
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: RELEASE_SERVICE_CONFIG
/// 3. Default: release-service.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("RELEASE_SERVICE_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
}
