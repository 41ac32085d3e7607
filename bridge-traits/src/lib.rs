//! # Host Bridge Traits
//!
//! Contracts for the collaborators the sync core calls but does not own.
//!
//! ## Overview
//!
//! The core drives per-game sync jobs and batch runs; everything that touches
//! the outside world goes through a trait defined here and implemented by the
//! host (`bridge-desktop` on desktop).
//!
//! ## Traits
//!
//! ### Sync Engine
//! - [`SyncEngine`](engine::SyncEngine) - Start real/dry runs, poll incremental logs, abort
//!
//! ### Persistence
//! - [`SettingsStore`](settings::SettingsStore) - Sync preferences (dry run, bisync, remote)
//! - [`SelectionStore`](settings::SelectionStore) - Remembered multi-sync selection
//!
//! ### User Interaction
//! - [`ConfirmationPrompt`](prompt::ConfirmationPrompt) - Confirm destructive actions
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability is
//! missing instead of falling back to a silent no-op:
//!
//! ```ignore
//! let engine = config.engine
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "SyncEngine".to_string(),
//!         message: "No sync engine provided. \
//!                  Desktop: enable the `desktop-shims` feature.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform errors into it and keep the message actionable: the sync
//! core shows it to the user verbatim when a run fails.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared between the runner, its poll tasks and the batch orchestrator.

pub mod engine;
pub mod error;
pub mod game;
pub mod prompt;
pub mod settings;
pub mod time;

pub use error::{BridgeError, Result};

// Re-export commonly used types
pub use engine::{EngineLogEnvelope, SyncEngine};
pub use game::GameId;
pub use prompt::{ConfirmationPrompt, ConfirmationRequest, FixedConfirmation};
pub use settings::{SelectionStore, SettingsStore, SyncSettings};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
