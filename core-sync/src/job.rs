//! # Sync Job State Machine
//!
//! One [`SyncJob`] per game, mutated only through validated transitions.
//!
//! ## State Machine
//!
//! ```text
//!            ┌──────────── retry ─────────────┐
//!            ▼                                │
//! Idle → Running(DryRun) → AwaitingConfirmation → Running(Real) → Succeeded
//!            │                    │                    │
//!            ├──→ Failed ─────────┼────────────────────┤
//!            └──→ Cancelled ←─────┘←───────────────────┘
//! ```
//!
//! A new run may begin from any non-active state. `AwaitingConfirmation`
//! only moves on to a real run, to `Cancelled`, or (batch runs) straight to
//! `Succeeded`.
//!
//! ## Usage
//!
//! ```rust
//! use chrono::Utc;
//! use core_sync::{JobStatus, SyncJob, SyncMode};
//!
//! let mut job = SyncJob::new("hades".into());
//! job.begin_run(SyncMode::DryRun, Utc::now()).unwrap();
//! job.append_lines(vec!["PENDING: copy - save1.sav; size 1MB".into()]).unwrap();
//! job.await_confirmation(Utc::now()).unwrap();
//! assert_eq!(job.status, JobStatus::AwaitingConfirmation);
//! ```

use bridge_traits::GameId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, SyncError};

// ============================================================================
// Mode & Status
// ============================================================================

/// Whether a run modifies data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Report what would change without touching anything.
    DryRun,
    /// Perform the sync.
    Real,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::DryRun => "dryrun",
            SyncMode::Real => "real",
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, SyncMode::DryRun)
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current status of a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No run yet, or the job was reset
    Idle,
    /// The engine is running and being polled
    Running,
    /// A dry run finished; its preview waits for the user
    AwaitingConfirmation,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Running or waiting on the user; at most one such job per game.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Running | JobStatus::AwaitingConfirmation)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Running => "running",
            JobStatus::AwaitingConfirmation => "awaiting_confirmation",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Sync Job Entity
// ============================================================================

/// Sync state for one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJob {
    pub game_id: GameId,
    /// Mode of the current or last run; a retry replays it.
    pub mode: SyncMode,
    pub status: JobStatus,
    /// Display lines of the current run.
    pub messages: Vec<String>,
    /// Set when the last run failed.
    pub retry_requested: bool,
    /// Increases with every run start; `0` means never started.
    pub run: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Error of the last failed run.
    pub error_message: Option<String>,
}

impl SyncJob {
    /// Create an idle job.
    pub fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            mode: SyncMode::Real,
            status: JobStatus::Idle,
            messages: Vec::new(),
            retry_requested: false,
            run: 0,
            started_at: None,
            finished_at: None,
            error_message: None,
        }
    }

    /// Start a new run, clearing the previous run's messages.
    ///
    /// Allowed from any non-active state, and from `AwaitingConfirmation`
    /// when `mode` is [`SyncMode::Real`] (the user confirmed the preview).
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` otherwise.
    pub fn begin_run(&mut self, mode: SyncMode, now: DateTime<Utc>) -> Result<u64> {
        self.validate_transition(JobStatus::Running)?;
        if self.status == JobStatus::AwaitingConfirmation && mode.is_dry_run() {
            return Err(self.invalid(
                JobStatus::Running,
                "Only a real sync may follow a dry-run preview",
            ));
        }

        self.mode = mode;
        self.status = JobStatus::Running;
        self.messages.clear();
        self.retry_requested = false;
        self.error_message = None;
        self.run += 1;
        self.started_at = Some(now);
        self.finished_at = None;
        Ok(self.run)
    }

    /// Append display lines to the running job.
    ///
    /// # Errors
    ///
    /// Returns an error if the job is not `Running`.
    pub fn append_lines<I>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        if self.status != JobStatus::Running {
            return Err(SyncError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: "append_lines".to_string(),
                reason: "Job must be running to append messages".to_string(),
            });
        }

        self.messages.extend(lines);
        Ok(())
    }

    /// A dry run finished; hold its preview for the user.
    pub fn await_confirmation(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.validate_transition(JobStatus::AwaitingConfirmation)?;
        if !self.mode.is_dry_run() {
            return Err(self.invalid(
                JobStatus::AwaitingConfirmation,
                "Only a dry run produces a preview",
            ));
        }

        self.status = JobStatus::AwaitingConfirmation;
        self.finished_at = Some(now);
        Ok(())
    }

    /// A real run finished.
    pub fn succeed(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.validate_transition(JobStatus::Succeeded)?;
        if self.status == JobStatus::Running && self.mode.is_dry_run() {
            return Err(self.invalid(
                JobStatus::Succeeded,
                "A dry run must wait for confirmation",
            ));
        }
        if self.status == JobStatus::AwaitingConfirmation {
            return Err(self.invalid(
                JobStatus::Succeeded,
                "Use accept_preview to settle a dry-run preview",
            ));
        }

        self.status = JobStatus::Succeeded;
        self.finished_at = Some(now);
        Ok(())
    }

    /// Settle a dry-run preview without a per-game confirmation.
    pub fn accept_preview(&mut self) -> Result<()> {
        if self.status != JobStatus::AwaitingConfirmation {
            return Err(self.invalid(
                JobStatus::Succeeded,
                "No dry-run preview to accept",
            ));
        }

        self.status = JobStatus::Succeeded;
        Ok(())
    }

    /// The running job failed; `message` becomes its last display line.
    pub fn fail(&mut self, message: String, now: DateTime<Utc>) -> Result<()> {
        self.validate_transition(JobStatus::Failed)?;

        self.status = JobStatus::Failed;
        self.messages.push(message.clone());
        self.error_message = Some(message);
        self.retry_requested = true;
        self.finished_at = Some(now);
        Ok(())
    }

    /// Cancel a running job or a pending preview.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.validate_transition(JobStatus::Cancelled)?;

        self.status = JobStatus::Cancelled;
        self.finished_at = Some(now);
        Ok(())
    }

    /// Mode a retry should replay.
    ///
    /// # Errors
    ///
    /// Returns an error unless the job is `Failed`.
    pub fn prepare_retry(&self) -> Result<SyncMode> {
        if self.status != JobStatus::Failed {
            return Err(self.invalid(JobStatus::Running, "Only a failed job can be retried"));
        }
        Ok(self.mode)
    }

    /// Return an inactive job to `Idle` with an empty log.
    pub fn reset(&mut self) -> Result<()> {
        self.validate_transition(JobStatus::Idle)?;

        self.status = JobStatus::Idle;
        self.messages.clear();
        self.retry_requested = false;
        self.error_message = None;
        self.started_at = None;
        self.finished_at = None;
        Ok(())
    }

    /// Validate a state transition
    fn validate_transition(&self, to: JobStatus) -> Result<()> {
        use JobStatus::*;

        let valid = match (self.status, to) {
            // New run from any settled state
            (Idle | Succeeded | Failed | Cancelled, Running) => true,

            // From Running
            (Running, AwaitingConfirmation | Succeeded | Failed | Cancelled) => true,

            // From AwaitingConfirmation
            (AwaitingConfirmation, Running | Succeeded | Cancelled) => true,

            // Reset
            (Idle | Succeeded | Failed | Cancelled, Idle) => true,

            _ => false,
        };

        if !valid {
            return Err(self.invalid(
                to,
                &format!("Cannot transition from {} to {}", self.status, to),
            ));
        }

        Ok(())
    }

    fn invalid(&self, to: JobStatus, reason: &str) -> SyncError {
        SyncError::InvalidStateTransition {
            from: self.status.as_str().to_string(),
            to: to.as_str().to_string(),
            reason: reason.to_string(),
        }
    }
}
