//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (sync engine,
//! settings and selection stores, confirmation prompt) into the shared core.
//! Desktop apps typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) so the JSON settings store is injected when none is
//! given.
//!
//! ```ignore
//! use core_service::{CoreConfig, CoreService};
//!
//! let service = CoreService::bootstrap(
//!     CoreConfig::builder()
//!         .engine(engine)
//!         .confirmation_prompt(prompt),
//! )?;
//! let mut handle = service.runner().start("hades".into(), SyncMode::DryRun).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_runtime::logging::{LogFormat, LoggingConfig};
pub use core_runtime::{CoreConfig, CoreConfigBuilder, CoreEvent, EventStream};
pub use core_search::ScoredCandidate;
pub use core_sync::{BatchSyncOrchestrator, JobStatus, SyncJobRunner, SyncMode};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::{GameLocation, JsonSettingsStore, RcloneOptions, RcloneSyncEngine};

use std::sync::Arc;

use bridge_traits::SyncSettings;
use core_runtime::EventBus;
use core_sync::SyncError;
use tracing::info;

/// Primary façade exposed to host applications.
///
/// Owns one [`SyncJobRunner`] and one [`BatchSyncOrchestrator`] sharing a
/// single event bus. Cloning is cheap; clones drive the same jobs.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    event_bus: EventBus,
    runner: SyncJobRunner,
    batch: Arc<BatchSyncOrchestrator>,
}

impl CoreService {
    /// Create a service from a validated configuration.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer);
        let runner = SyncJobRunner::from_config(&config, event_bus.clone());
        let batch = BatchSyncOrchestrator::from_config(&config, runner.clone(), event_bus.clone());

        info!(
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            search_threshold = config.search_threshold,
            "Core service initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            event_bus,
            runner,
            batch: Arc::new(batch),
        })
    }

    /// Build the configuration and the service in one step.
    pub fn bootstrap(builder: CoreConfigBuilder) -> Result<Self> {
        Self::new(builder.build()?)
    }

    /// Install the global log subscriber. The configured `LoggerSink` is
    /// attached unless `logging` already carries one.
    pub fn init_logging(&self, mut logging: LoggingConfig) -> Result<()> {
        if logging.logger_sink.is_none() {
            logging.logger_sink = self.config.logger_sink.clone();
        }
        core_runtime::logging::init_logging(logging)?;
        Ok(())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn runner(&self) -> &SyncJobRunner {
        &self.runner
    }

    pub fn batch(&self) -> Arc<BatchSyncOrchestrator> {
        Arc::clone(&self.batch)
    }

    /// New subscription to every sync and batch event.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Filter `candidates` against `pattern` with the configured threshold.
    pub fn search<T>(&self, pattern: &str, candidates: &[T]) -> Vec<ScoredCandidate<T>>
    where
        T: AsRef<str> + Clone,
    {
        core_search::filter_candidates(pattern, candidates, self.config.search_threshold)
    }

    pub async fn sync_settings(&self) -> Result<SyncSettings> {
        self.config
            .settings_store
            .get_sync_settings()
            .await
            .map_err(|e| SyncError::Settings(e.to_string()).into())
    }

    pub async fn commit_sync_settings(&self, settings: &SyncSettings) -> Result<()> {
        self.config
            .settings_store
            .commit_sync_settings(settings)
            .await
            .map_err(|e| SyncError::Settings(e.to_string()).into())
    }
}
