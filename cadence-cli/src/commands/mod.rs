pub mod check_config;
pub mod daemon;
pub mod diff;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use cadence_core::{config, Config, Orchestrator};
use cadence_marathon::MarathonClient;
use cadence_sync::Reconciler;

/// Home directory plus the loaded configuration.
pub(crate) fn load(config_path: Option<&Path>) -> Result<(PathBuf, Config)> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config::config_path_at(&home));
    let config = config::load_from(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    Ok((home, config))
}

/// Reconciler wired to the configured Marathon endpoint.
pub(crate) fn reconciler(config: &Config) -> Result<Reconciler> {
    let client = MarathonClient::new(&config.marathon).context("failed to build Marathon client")?;
    let orchestrator: Arc<dyn Orchestrator> = Arc::new(client);
    Reconciler::from_config(config, orchestrator).context("failed to load template")
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
