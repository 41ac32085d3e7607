//! Sync Engine Abstraction
//!
//! Contract for the external process that actually moves save data between a
//! local folder and cloud storage. The core only ever starts a run, polls its
//! incremental log output and asks for a best-effort abort.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::Result, game::GameId};

/// One poll result as produced by [`SyncEngine::poll_logs`].
///
/// `message` holds newline-delimited sub-records. Each sub-record is usually a
/// JSON log object emitted by the engine but may be arbitrary text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLogEnvelope {
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Finished", default)]
    pub finished: bool,
}

impl EngineLogEnvelope {
    pub fn progress(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            finished: false,
        }
    }

    pub fn finished(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            finished: true,
        }
    }

    /// Encode the envelope the way `poll_logs` returns it.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// External sync engine
///
/// Implementations own the engine process and buffer its log output per
/// game until the core polls it.
///
/// # Polling contract
///
/// `poll_logs` returns `""` when nothing new is available, otherwise a JSON
/// encoded [`EngineLogEnvelope`]. Once an envelope with `Finished: true` (or
/// an error) has been returned the implementation may forget the game.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::engine::SyncEngine;
///
/// async fn preview(engine: &dyn SyncEngine, game: &GameId) -> Result<()> {
///     engine.start_dry_run(game).await?;
///     loop {
///         let raw = engine.poll_logs(game).await?;
///         if raw.contains("\"Finished\":true") {
///             break;
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SyncEngine: Send + Sync {
    /// Begin a real sync for `game`.
    async fn start_sync(&self, game: &GameId) -> Result<()>;

    /// Begin a dry run for `game`; nothing is modified.
    async fn start_dry_run(&self, game: &GameId) -> Result<()>;

    /// Fetch the next batch of log output for `game`.
    async fn poll_logs(&self, game: &GameId) -> Result<String>;

    /// Best-effort abort of an in-flight run.
    async fn cancel_sync(&self, game: &GameId) -> Result<()>;
}
