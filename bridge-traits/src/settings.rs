//! Persisted Settings Abstractions
//!
//! Sync preferences and the remembered multi-sync selection live outside the
//! core; hosts decide where they are stored.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::Result, game::GameId};

/// User-facing sync preferences.
///
/// Field names follow the on-disk camelCase layout so existing preference
/// files keep loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Name of the configured cloud remote (empty when not set up).
    pub cloud: String,
    /// Preview every sync with a dry run before applying it.
    pub perform_dry_run: bool,
    /// Use the engine's bidirectional mode instead of one-way sync.
    pub use_bi_sync: bool,
    /// Skip the extra confirmation for large transfers.
    pub should_not_prompt_for_large_syncs: bool,
}

/// Read/write access to [`SyncSettings`].
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_sync_settings(&self) -> Result<SyncSettings>;

    async fn commit_sync_settings(&self, settings: &SyncSettings) -> Result<()>;
}

/// Persisted set of games checked for batch sync.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::settings::SelectionStore;
///
/// async fn remember(store: &dyn SelectionStore, games: &[GameId]) -> Result<()> {
///     store.commit_selection(games).await
/// }
/// ```
#[async_trait]
pub trait SelectionStore: Send + Sync {
    async fn get_selection(&self) -> Result<Vec<GameId>>;

    async fn commit_selection(&self, games: &[GameId]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip_camel_case() {
        let json = r#"{"cloud":"drive","performDryRun":true,"useBiSync":false,"shouldNotPromptForLargeSyncs":true}"#;
        let settings: SyncSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.cloud, "drive");
        assert!(settings.perform_dry_run);
        assert!(!settings.use_bi_sync);
        assert!(settings.should_not_prompt_for_large_syncs);
    }

    #[test]
    fn test_settings_missing_keys_default() {
        let settings: SyncSettings = serde_json::from_str(r#"{"cloud":"box"}"#).unwrap();
        assert_eq!(settings.cloud, "box");
        assert!(!settings.perform_dry_run);
    }
}
