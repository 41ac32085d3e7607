//! # Sync Module
//!
//! Drives save-data syncs through an external sync engine.
//!
//! ## Overview
//!
//! This module manages the lifecycle of per-game sync jobs, including:
//! - Starting dry runs and real syncs through `SyncEngine`
//! - Polling the engine and rendering its log records into display lines
//! - Holding dry-run previews until the user confirms them
//! - Cancelling, retrying and closing jobs
//! - Running the checked games of a multi-sync session one at a time
//!
//! ## Components
//!
//! - **Sync Job State Machine** (`job`): Job lifecycle with validated state transitions
//! - **Message Formatting** (`format`): Engine log records to display lines
//! - **Sync Job Runner** (`runner`): Per-game runs and their poll tasks
//! - **Batch Orchestrator** (`batch`): Sequential multi-game syncs

pub mod batch;
pub mod error;
pub mod format;
pub mod job;
pub mod runner;

pub use batch::{BatchCancelHandle, BatchOutcome, BatchReport, BatchSyncOrchestrator};
pub use error::{Result, SyncError};
pub use format::{
    decode_envelope, failure_message, EngineLogRecord, LogLine, MessageFormatter,
    SYNC_COMPLETE_LINE,
};
pub use job::{JobStatus, SyncJob, SyncMode};
pub use runner::{JobHandle, SyncJobRunner};
