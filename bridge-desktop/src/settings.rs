//! Settings Storage using JSON files

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    GameId, SelectionStore, SettingsStore, SyncSettings,
};
use serde::{de::DeserializeOwned, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const APP_DIR: &str = "cloudsave";
const SETTINGS_FILE: &str = "cloudsave_perfs.json";
const SELECTION_FILE: &str = "multisync_selection.json";

/// File-backed settings and selection store.
///
/// Preferences live in `cloudsave_perfs.json` and the remembered batch
/// selection in `multisync_selection.json`, both under one directory.
/// Writes go through a temporary file and a rename so a crash never leaves
/// a half-written file behind.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    dir: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted in the user's config directory.
    pub fn default_location() -> Result<Self> {
        let base = dirs::config_dir().ok_or_else(|| {
            BridgeError::NotAvailable("No config directory on this platform".to_string())
        })?;
        Ok(Self::new(base.join(APP_DIR)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.dir.join(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = ?path, "Settings file missing, using defaults");
                Ok(None)
            }
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{file}.tmp"));
        let bytes = serde_json::to_vec_pretty(value)?;

        tokio::fs::write(&tmp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            warn!(path = ?path, error = %e, "Failed to replace settings file");
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(BridgeError::Io(e));
        }

        debug!(path = ?path, "Wrote settings file");
        Ok(())
    }
}

/// Defaults for a first launch: preview before syncing.
fn first_launch_settings() -> SyncSettings {
    SyncSettings {
        perform_dry_run: true,
        ..Default::default()
    }
}

#[async_trait]
impl SettingsStore for JsonSettingsStore {
    async fn get_sync_settings(&self) -> Result<SyncSettings> {
        Ok(self
            .read_json(SETTINGS_FILE)
            .await?
            .unwrap_or_else(first_launch_settings))
    }

    async fn commit_sync_settings(&self, settings: &SyncSettings) -> Result<()> {
        self.write_json(SETTINGS_FILE, settings).await
    }
}

#[async_trait]
impl SelectionStore for JsonSettingsStore {
    async fn get_selection(&self) -> Result<Vec<GameId>> {
        let ids: Option<Vec<String>> = self.read_json(SELECTION_FILE).await?;
        Ok(ids
            .unwrap_or_default()
            .into_iter()
            .map(GameId::from)
            .collect())
    }

    async fn commit_selection(&self, games: &[GameId]) -> Result<()> {
        let ids: Vec<&str> = games.iter().map(GameId::as_str).collect();
        self.write_json(SELECTION_FILE, &ids).await
    }
}
