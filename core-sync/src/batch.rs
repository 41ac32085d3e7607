//! # Batch Sync Orchestrator
//!
//! Runs the checked games of a multi-sync session one after another.
//!
//! ## Overview
//!
//! - Jobs run strictly sequentially: the engine's configuration is process
//!   wide, so job K+1 starts only after job K settled
//! - A failed job never stops the batch; only cancellation does
//! - After a completed dry-run batch the next run on the same selection goes
//!   straight to the real sync (dry-run carryover)
//! - The checked selection is loaded on open and persisted on close
//!
//! ## Usage
//!
//! ```rust,ignore
//! let batch = BatchSyncOrchestrator::from_config(&config, runner, event_bus);
//! batch.open(games).await?;
//! let preview = batch.run_selected().await?;   // dry run
//! let report = batch.run_selected().await?;    // real sync
//! batch.close().await?;
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::{GameId, SelectionStore, SettingsStore};
use core_async::runtime;
use core_async::sync::Mutex;
use core_runtime::events::{BatchEvent, CoreEvent, EventBus};
use core_runtime::CoreConfig;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    job::{JobStatus, SyncMode},
    runner::SyncJobRunner,
    Result, SyncError,
};

/// Settled status of one batch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub game_id: GameId,
    pub status: JobStatus,
}

/// Result of [`BatchSyncOrchestrator::run_selected`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub mode: SyncMode,
    /// Jobs that were started, in run order. Games never started are absent.
    pub outcomes: Vec<BatchOutcome>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(JobStatus::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    /// Status of `game_id` if it was started.
    pub fn status_of(&self, game_id: &GameId) -> Option<JobStatus> {
        self.outcomes
            .iter()
            .find(|outcome| &outcome.game_id == game_id)
            .map(|outcome| outcome.status)
    }

    fn count(&self, status: JobStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }
}

/// Raises the batch cancellation flag from any task.
///
/// Unlike [`BatchSyncOrchestrator::cancel`] it does not abort the active
/// job; the batch stops before the next one.
#[derive(Debug, Clone)]
pub struct BatchCancelHandle {
    flag: Arc<AtomicBool>,
}

impl BatchCancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct BatchState {
    /// Listed games in display order.
    games: Vec<GameId>,
    selected: HashSet<GameId>,
    active_job: Option<GameId>,
    running: bool,
    dry_run_carryover: bool,
}

impl BatchState {
    fn selected_in_order(&self) -> Vec<GameId> {
        self.games
            .iter()
            .filter(|game| self.selected.contains(*game))
            .cloned()
            .collect()
    }
}

/// Clears `running` and `active_job` if a batch future is dropped before it
/// finishes.
struct RunGuard {
    state: Arc<Mutex<BatchState>>,
    armed: bool,
}

impl RunGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        if let Ok(mut state) = self.state.try_lock() {
            state.running = false;
            state.active_job = None;
            return;
        }

        match runtime::Handle::try_current() {
            Ok(handle) => {
                let state = Arc::clone(&self.state);
                handle.spawn(async move {
                    let mut state = state.lock().await;
                    state.running = false;
                    state.active_job = None;
                });
            }
            Err(_) => warn!("Multi-sync dropped outside a runtime, state left running"),
        }
    }
}

/// Multi-game sync session.
pub struct BatchSyncOrchestrator {
    runner: SyncJobRunner,
    settings: Arc<dyn SettingsStore>,
    selection_store: Arc<dyn SelectionStore>,
    event_bus: EventBus,
    state: Arc<Mutex<BatchState>>,
    cancel_requested: Arc<AtomicBool>,
}

impl BatchSyncOrchestrator {
    pub fn new(
        runner: SyncJobRunner,
        settings: Arc<dyn SettingsStore>,
        selection_store: Arc<dyn SelectionStore>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            runner,
            settings,
            selection_store,
            event_bus,
            state: Arc::new(Mutex::new(BatchState::default())),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &CoreConfig, runner: SyncJobRunner, event_bus: EventBus) -> Self {
        Self::new(
            runner,
            Arc::clone(&config.settings_store),
            Arc::clone(&config.selection_store),
            event_bus,
        )
    }

    /// Open the session for `games`, in display order.
    ///
    /// Every listed job is reset to `Idle` and the games found in the saved
    /// selection are checked.
    ///
    /// # Errors
    ///
    /// `BatchInProgress` while a batch runs, `AlreadyActive` if one of the
    /// games has a single-game sync in flight, `Selection` if the saved
    /// selection cannot be read.
    #[instrument(skip(self, games), fields(games = games.len()))]
    pub async fn open(&self, games: Vec<GameId>) -> Result<()> {
        if self.state.lock().await.running {
            return Err(SyncError::BatchInProgress);
        }

        let saved = self
            .selection_store
            .get_selection()
            .await
            .map_err(|e| SyncError::Selection(e.to_string()))?;

        self.runner.reset(&games).await?;

        let mut state = self.state.lock().await;
        if state.running {
            return Err(SyncError::BatchInProgress);
        }

        let saved: HashSet<GameId> = saved.into_iter().collect();
        state.selected = games
            .iter()
            .filter(|game| saved.contains(*game))
            .cloned()
            .collect();
        state.games = games;
        state.active_job = None;
        state.dry_run_carryover = false;
        self.cancel_requested.store(false, Ordering::SeqCst);

        info!(selected = state.selected.len(), "Multi-sync opened");
        self.emit(BatchEvent::Opened {
            games: state.games.len(),
            selected: state.selected.len(),
        });
        Ok(())
    }

    /// Sync every checked game in display order.
    ///
    /// Runs a dry run when the settings ask for one and the previous batch
    /// was not a completed dry run on the same selection.
    ///
    /// Dropping the returned future ends the batch; a job already started
    /// keeps running in the runner.
    ///
    /// # Errors
    ///
    /// `BatchInProgress` if a batch is already running, `Settings` if the
    /// settings cannot be read. Job failures are reported in the
    /// [`BatchReport`], never as an error.
    #[instrument(skip(self))]
    pub async fn run_selected(&self) -> Result<BatchReport> {
        let (queue, carryover) = {
            let mut state = self.state.lock().await;
            if state.running {
                return Err(SyncError::BatchInProgress);
            }
            state.running = true;
            (state.selected_in_order(), state.dry_run_carryover)
        };
        let guard = RunGuard {
            state: Arc::clone(&self.state),
            armed: true,
        };

        let settings = self
            .settings
            .get_sync_settings()
            .await
            .map_err(|e| SyncError::Settings(e.to_string()))?;

        let mode = if settings.perform_dry_run && !carryover {
            SyncMode::DryRun
        } else {
            SyncMode::Real
        };

        info!(total = queue.len(), %mode, "Multi-sync started");
        self.emit(BatchEvent::Started {
            total: queue.len(),
            dry_run: mode.is_dry_run(),
        });

        let mut outcomes = Vec::with_capacity(queue.len());
        let mut cancelled = false;

        for (index, game_id) in queue.iter().enumerate() {
            if self.cancel_requested.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            self.state.lock().await.active_job = Some(game_id.clone());
            self.emit(BatchEvent::JobStarted {
                game_id: game_id.to_string(),
                position: index + 1,
                total: queue.len(),
            });

            let status = self.run_one(game_id, mode).await;
            self.state.lock().await.active_job = None;

            debug!(game_id = %game_id, %status, "Multi-sync job settled");
            self.emit(BatchEvent::JobSettled {
                game_id: game_id.to_string(),
                succeeded: status == JobStatus::Succeeded,
            });
            outcomes.push(BatchOutcome {
                game_id: game_id.clone(),
                status,
            });
        }

        cancelled |= self.cancel_requested.load(Ordering::SeqCst);

        {
            let mut state = self.state.lock().await;
            state.running = false;
            state.active_job = None;
            state.dry_run_carryover = match mode {
                SyncMode::DryRun => !cancelled,
                SyncMode::Real => false,
            };
        }
        guard.disarm();

        let report = BatchReport {
            mode,
            outcomes,
            cancelled,
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled,
            "Multi-sync finished"
        );
        self.emit(BatchEvent::Finished {
            succeeded: report.succeeded(),
            failed: report.failed(),
            cancelled,
            dry_run: mode.is_dry_run(),
        });
        Ok(report)
    }

    /// Stop the batch before its next job and abort the active one.
    ///
    /// Aborting an in-flight real sync asks the user first; if they decline
    /// the active job finishes but no further job starts.
    #[instrument(skip(self))]
    pub async fn cancel(&self) -> Result<()> {
        self.request_cancel();

        let active = self.state.lock().await.active_job.clone();
        if let Some(game_id) = active {
            match self.runner.cancel(&game_id).await {
                Ok(true) => {}
                Ok(false) => info!(game_id = %game_id, "Active job left running"),
                // Settled on its own.
                Err(SyncError::InvalidStateTransition { .. }) | Err(SyncError::JobNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn cancel_handle(&self) -> BatchCancelHandle {
        BatchCancelHandle {
            flag: Arc::clone(&self.cancel_requested),
        }
    }

    /// Close the session.
    ///
    /// With a job in flight the user must confirm; a refusal keeps the batch
    /// running and returns `false`. The checked selection is saved either
    /// way.
    #[instrument(skip(self))]
    pub async fn close(&self) -> Result<bool> {
        let (active, selection) = {
            let state = self.state.lock().await;
            (state.active_job.clone(), state.selected_in_order())
        };

        let may_close = match &active {
            Some(game_id) => match self.runner.confirm_cancellation(game_id).await {
                Ok(confirmed) => confirmed,
                Err(e) => {
                    warn!(error = %e, "Confirmation failed, keeping multi-sync open");
                    false
                }
            },
            None => true,
        };

        if may_close {
            if let Some(game_id) = &active {
                self.request_cancel();
                match self.runner.abort(game_id).await {
                    Ok(()) => {}
                    Err(SyncError::InvalidStateTransition { .. }) | Err(SyncError::JobNotFound { .. }) => {}
                    Err(e) => warn!(game_id = %game_id, error = %e, "Could not abort active job"),
                }
            }
        }

        self.selection_store
            .commit_selection(&selection)
            .await
            .map_err(|e| SyncError::Selection(e.to_string()))?;
        self.emit(BatchEvent::SelectionSaved {
            selected: selection.len(),
        });

        Ok(may_close)
    }

    /// Check or uncheck one listed game. Unknown games are ignored.
    pub async fn set_checked(&self, game_id: &GameId, checked: bool) {
        let mut state = self.state.lock().await;
        if !state.games.contains(game_id) {
            return;
        }

        let changed = if checked {
            state.selected.insert(game_id.clone())
        } else {
            state.selected.remove(game_id)
        };
        if changed {
            state.dry_run_carryover = false;
        }
    }

    pub async fn select_all(&self) {
        let mut state = self.state.lock().await;
        state.selected = state.games.iter().cloned().collect();
        state.dry_run_carryover = false;
    }

    pub async fn unselect_all(&self) {
        let mut state = self.state.lock().await;
        state.selected.clear();
        state.dry_run_carryover = false;
    }

    /// Checked games in display order.
    pub async fn selected(&self) -> Vec<GameId> {
        self.state.lock().await.selected_in_order()
    }

    /// Game whose job is executing, if any.
    pub async fn active_job(&self) -> Option<GameId> {
        self.state.lock().await.active_job.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Whether the next run skips the dry run.
    pub async fn dry_run_carryover(&self) -> bool {
        self.state.lock().await.dry_run_carryover
    }

    pub fn runner(&self) -> &SyncJobRunner {
        &self.runner
    }

    async fn run_one(&self, game_id: &GameId, mode: SyncMode) -> JobStatus {
        let mut handle = match self.runner.start(game_id.clone(), mode).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(game_id = %game_id, error = %e, "Could not start multi-sync job");
                return JobStatus::Failed;
            }
        };

        match handle.settled().await {
            JobStatus::AwaitingConfirmation => match self.runner.accept_preview(game_id).await {
                Ok(()) => JobStatus::Succeeded,
                Err(e) => {
                    // Cancelled between settling and acceptance.
                    debug!(game_id = %game_id, error = %e, "Preview not accepted");
                    self.runner
                        .status(game_id)
                        .await
                        .unwrap_or(JobStatus::Cancelled)
                }
            },
            status => status,
        }
    }

    fn request_cancel(&self) {
        if !self.cancel_requested.swap(true, Ordering::SeqCst) {
            info!("Multi-sync cancellation requested");
            self.emit(BatchEvent::CancelRequested);
        }
    }

    fn emit(&self, event: BatchEvent) {
        self.event_bus.emit(CoreEvent::Batch(event)).ok();
    }
}
