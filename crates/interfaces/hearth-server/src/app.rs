use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use camino::Utf8PathBuf;
use directories::ProjectDirs;
use hearth_app_core::{
    CommandQueue, EventBus, HouseholdCommands, QueueConfig, SubmissionResource,
    ValidationErrorStore,
};
use hearth_persistence::{HouseholdStore, MemoryHouseholdStore, RedbHouseholdStore};
use tracing::info;

const QUALIFIER: &str = "org";
const ORG: &str = "hearth";
const APP: &str = "hearth";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Where `hearth.redb` lives. Defaults to the platform data directory.
    pub data_dir: Option<Utf8PathBuf>,
    pub in_memory: bool,
    pub command_timeout_secs: u64,
    pub validation_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: hearth_config::DEFAULT_BIND_ADDR.to_string(),
            data_dir: None,
            in_memory: false,
            command_timeout_secs: hearth_config::DEFAULT_COMMAND_TIMEOUT_SECS,
            validation_ttl_secs: hearth_config::DEFAULT_VALIDATION_TTL_SECS,
        }
    }
}

impl ServerConfig {
    fn resolved_data_dir(&self) -> anyhow::Result<Utf8PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let proj_dirs = ProjectDirs::from(QUALIFIER, ORG, APP)
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Utf8PathBuf::from_path_buf(proj_dirs.data_dir().to_path_buf())
            .map_err(|p| {
                anyhow::anyhow!("data directory is not UTF-8: {}", p.display())
            })
    }
}

pub fn open_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn HouseholdStore>> {
    if config.in_memory {
        info!("using in-memory store; records are lost on exit");
        return Ok(Arc::new(MemoryHouseholdStore::new()));
    }
    let dir = config.resolved_data_dir()?;
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {dir}"))?;
    let store = RedbHouseholdStore::open_or_recover(&dir)
        .with_context(|| format!("Failed to open store in {dir}"))?;
    info!(path = %store.path(), "store opened");
    Ok(Arc::new(store))
}

/// Everything request handlers share. One instance per process; tests build
/// as many isolated ones as they like.
#[derive(Clone)]
pub struct AppServices {
    pub bus: EventBus,
    pub queue: Arc<CommandQueue>,
    pub submissions: SubmissionResource,
    pub validation: Arc<ValidationErrorStore>,
    pub store: Arc<dyn HouseholdStore>,
}

impl AppServices {
    pub fn new(store: Arc<dyn HouseholdStore>, config: &ServerConfig) -> Self {
        let bus = EventBus::new();
        let commands = Arc::new(HouseholdCommands::new(store.clone()));
        let queue = Arc::new(CommandQueue::new(
            bus.clone(),
            commands.clone(),
            commands,
            QueueConfig::with_timeout_secs(config.command_timeout_secs),
        ));
        let validation = Arc::new(ValidationErrorStore::new(Duration::from_secs(
            config.validation_ttl_secs,
        )));
        let submissions = SubmissionResource::new(queue.clone(), bus.clone(), validation.clone());
        Self {
            bus,
            queue,
            submissions,
            validation,
            store,
        }
    }
}
