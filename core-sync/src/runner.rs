//! # Sync Job Runner
//!
//! Drives one [`SyncJob`] per game against the external [`SyncEngine`].
//!
//! ## Workflow
//!
//! 1. `start` reserves the job (status `Running`, messages cleared) under the
//!    runner lock, then asks the engine to begin a dry run or a real sync
//! 2. A poll task owned by that run sleeps `poll_interval`, polls the engine
//!    and appends formatted lines until a terminal record arrives
//! 3. Dry runs stop in `AwaitingConfirmation`; `confirm_and_run` starts the
//!    real sync for the same game
//! 4. Engine errors become `Failed` plus a display line; `retry` replays the
//!    failed mode
//!
//! Only the run's own task polls, and every result is checked against the
//! job's run counter, so results from a cancelled or superseded run are
//! dropped.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let runner = SyncJobRunner::from_config(&config, event_bus);
//! let mut handle = runner.start(GameId::from("hades"), SyncMode::DryRun).await?;
//! if handle.settled().await == JobStatus::AwaitingConfirmation {
//!     runner.confirm_and_run(&GameId::from("hades")).await?;
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{Clock, ConfirmationPrompt, ConfirmationRequest, GameId, SyncEngine};
use core_async::sync::{watch, CancellationToken, Mutex};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_runtime::CoreConfig;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    format::{decode_envelope, failure_message, MessageFormatter},
    job::{JobStatus, SyncJob, SyncMode},
    Result, SyncError,
};

const CANCEL_SUBTITLE: &str = "Hitting confirm will cancel your pending sync operation.";

/// Status broadcast to [`JobHandle`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JobState {
    run: u64,
    status: JobStatus,
}

struct JobEntry {
    job: SyncJob,
    /// Cancelled when the current run is cancelled or forgotten.
    token: CancellationToken,
    state_tx: watch::Sender<JobState>,
}

impl JobEntry {
    fn new(game_id: GameId) -> Self {
        let job = SyncJob::new(game_id);
        let (state_tx, _) = watch::channel(JobState {
            run: job.run,
            status: job.status,
        });
        Self {
            job,
            token: CancellationToken::new(),
            state_tx,
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(JobState {
            run: self.job.run,
            status: self.job.status,
        });
    }

    fn handle(&self) -> JobHandle {
        JobHandle {
            game_id: self.job.game_id.clone(),
            run: self.job.run,
            state: self.state_tx.subscribe(),
        }
    }

    fn is_current(&self, run: u64) -> bool {
        self.job.run == run && self.job.status == JobStatus::Running
    }
}

/// Waits for one run of a job to leave `Running`.
#[derive(Debug)]
pub struct JobHandle {
    game_id: GameId,
    run: u64,
    state: watch::Receiver<JobState>,
}

impl JobHandle {
    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn run(&self) -> u64 {
        self.run
    }

    /// Resolve once this run is no longer `Running`.
    ///
    /// Returns the job status observed at that point. If the job was
    /// forgotten in the meantime the last published status is returned.
    pub async fn settled(&mut self) -> JobStatus {
        loop {
            let state = *self.state.borrow_and_update();
            if state.run != self.run || state.status != JobStatus::Running {
                return state.status;
            }
            if self.state.changed().await.is_err() {
                return self.state.borrow().status;
            }
        }
    }
}

struct RunnerInner {
    engine: Arc<dyn SyncEngine>,
    prompt: Arc<dyn ConfirmationPrompt>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    poll_interval: Duration,
    jobs: Mutex<HashMap<GameId, JobEntry>>,
}

/// Per-game sync job runner.
///
/// Cloning shares the same jobs.
#[derive(Clone)]
pub struct SyncJobRunner {
    inner: Arc<RunnerInner>,
}

impl SyncJobRunner {
    pub fn new(
        engine: Arc<dyn SyncEngine>,
        prompt: Arc<dyn ConfirmationPrompt>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(RunnerInner {
                engine,
                prompt,
                clock,
                event_bus,
                poll_interval,
                jobs: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Build a runner from the bridges and poll interval in `config`.
    pub fn from_config(config: &CoreConfig, event_bus: EventBus) -> Self {
        Self::new(
            Arc::clone(&config.engine),
            Arc::clone(&config.confirmation_prompt),
            Arc::clone(&config.clock),
            event_bus,
            config.poll_interval,
        )
    }

    /// Start a run for `game_id`.
    ///
    /// An engine start failure does not fail this call: the job becomes
    /// `Failed` with the error as its last line and the returned handle is
    /// already settled.
    ///
    /// # Errors
    ///
    /// `AlreadyActive` if the game's job is running or waiting for
    /// confirmation; its messages are left untouched.
    #[instrument(skip(self), fields(game_id = %game_id, mode = %mode))]
    pub async fn start(&self, game_id: GameId, mode: SyncMode) -> Result<JobHandle> {
        let (handle, token) = {
            let mut jobs = self.inner.jobs.lock().await;
            let entry = jobs
                .entry(game_id.clone())
                .or_insert_with(|| JobEntry::new(game_id.clone()));

            if entry.job.status.is_active() {
                return Err(SyncError::AlreadyActive {
                    game_id: game_id.to_string(),
                    status: entry.job.status.to_string(),
                });
            }

            Self::reserve(entry, mode, self.inner.clock.now())?
        };

        self.inner.launch(game_id, mode, handle.run, token).await;
        Ok(handle)
    }

    /// Run the real sync after the user accepted a dry-run preview.
    #[instrument(skip(self), fields(game_id = %game_id))]
    pub async fn confirm_and_run(&self, game_id: &GameId) -> Result<JobHandle> {
        let (handle, token) = {
            let mut jobs = self.inner.jobs.lock().await;
            let entry = jobs.get_mut(game_id).ok_or_else(|| not_found(game_id))?;

            if entry.job.status != JobStatus::AwaitingConfirmation {
                return Err(SyncError::InvalidStateTransition {
                    from: entry.job.status.to_string(),
                    to: JobStatus::Running.to_string(),
                    reason: "No dry-run preview waiting for confirmation".to_string(),
                });
            }

            Self::reserve(entry, SyncMode::Real, self.inner.clock.now())?
        };

        self.inner
            .launch(game_id.clone(), SyncMode::Real, handle.run, token)
            .await;
        Ok(handle)
    }

    /// Replay the mode of a failed run.
    #[instrument(skip(self), fields(game_id = %game_id))]
    pub async fn retry(&self, game_id: &GameId) -> Result<JobHandle> {
        let mode = {
            let jobs = self.inner.jobs.lock().await;
            let entry = jobs.get(game_id).ok_or_else(|| not_found(game_id))?;
            entry.job.prepare_retry()?
        };

        info!(%mode, "Retrying sync");
        self.start(game_id.clone(), mode).await
    }

    /// Cancel a running job or discard a pending preview.
    ///
    /// A real run in flight needs the user's confirmation first. Returns
    /// `false` when the user declined; the job is then left untouched.
    #[instrument(skip(self), fields(game_id = %game_id))]
    pub async fn cancel(&self, game_id: &GameId) -> Result<bool> {
        let (status, mode) = {
            let jobs = self.inner.jobs.lock().await;
            let entry = jobs.get(game_id).ok_or_else(|| not_found(game_id))?;
            (entry.job.status, entry.job.mode)
        };

        if !status.is_active() {
            return Err(SyncError::InvalidStateTransition {
                from: status.to_string(),
                to: JobStatus::Cancelled.to_string(),
                reason: "Only a running or pending job can be cancelled".to_string(),
            });
        }

        if status == JobStatus::Running && mode == SyncMode::Real {
            let confirmed = self.inner.confirm_cancellation(game_id).await?;
            if !confirmed {
                info!("Cancellation declined");
                return Ok(false);
            }
        }

        self.abort(game_id).await?;
        Ok(true)
    }

    /// Cancel an active job without asking the user.
    ///
    /// Callers that abort a real run must have confirmed it themselves.
    #[instrument(skip(self), fields(game_id = %game_id))]
    pub async fn abort(&self, game_id: &GameId) -> Result<()> {
        {
            let mut jobs = self.inner.jobs.lock().await;
            let entry = jobs.get_mut(game_id).ok_or_else(|| not_found(game_id))?;
            entry.job.cancel(self.inner.clock.now())?;
            entry.token.cancel();
            entry.publish();
        }

        if let Err(e) = self.inner.engine.cancel_sync(game_id).await {
            warn!(error = %e, "Engine did not acknowledge cancellation");
        }

        self.inner.emit(SyncEvent::Cancelled {
            game_id: game_id.to_string(),
        });
        info!("Sync cancelled");
        Ok(())
    }

    /// Close the job surface for `game_id`.
    ///
    /// An active job is cancelled first, with the same confirmation as
    /// [`cancel`](Self::cancel). Returns `false` when the user declined (the
    /// job keeps running); otherwise the job is forgotten.
    #[instrument(skip(self), fields(game_id = %game_id))]
    pub async fn close(&self, game_id: &GameId) -> Result<bool> {
        let active = self
            .status(game_id)
            .await
            .map_or(false, |status| status.is_active());

        if active {
            match self.cancel(game_id).await {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                // Settled while we were asking.
                Err(SyncError::InvalidStateTransition { .. }) => {}
                Err(SyncError::Confirmation(message)) => {
                    warn!(%message, "Confirmation failed, keeping the job open");
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }

        let mut jobs = self.inner.jobs.lock().await;
        if let Some(entry) = jobs.remove(game_id) {
            entry.token.cancel();
        }
        debug!("Job forgotten");
        Ok(true)
    }

    /// Settle a dry-run preview without running the real sync.
    pub async fn accept_preview(&self, game_id: &GameId) -> Result<()> {
        let mut jobs = self.inner.jobs.lock().await;
        let entry = jobs.get_mut(game_id).ok_or_else(|| not_found(game_id))?;
        entry.job.accept_preview()?;
        entry.publish();

        self.inner.emit(SyncEvent::Completed {
            game_id: game_id.to_string(),
            dry_run: true,
        });
        Ok(())
    }

    /// Return the listed jobs to `Idle`, creating missing ones.
    ///
    /// # Errors
    ///
    /// `AlreadyActive` if any listed job is active; nothing is reset then.
    pub async fn reset(&self, game_ids: &[GameId]) -> Result<()> {
        let mut jobs = self.inner.jobs.lock().await;

        if let Some(entry) = game_ids
            .iter()
            .filter_map(|id| jobs.get(id))
            .find(|entry| entry.job.status.is_active())
        {
            return Err(SyncError::AlreadyActive {
                game_id: entry.job.game_id.to_string(),
                status: entry.job.status.to_string(),
            });
        }

        for game_id in game_ids {
            let entry = jobs
                .entry(game_id.clone())
                .or_insert_with(|| JobEntry::new(game_id.clone()));
            entry.job.reset()?;
            entry.publish();
        }

        debug!(count = game_ids.len(), "Jobs reset");
        Ok(())
    }

    /// Copy of the job for `game_id`.
    pub async fn snapshot(&self, game_id: &GameId) -> Option<SyncJob> {
        let jobs = self.inner.jobs.lock().await;
        jobs.get(game_id).map(|entry| entry.job.clone())
    }

    pub async fn status(&self, game_id: &GameId) -> Option<JobStatus> {
        let jobs = self.inner.jobs.lock().await;
        jobs.get(game_id).map(|entry| entry.job.status)
    }

    /// Ask the user whether an in-flight real sync may be cancelled.
    pub async fn confirm_cancellation(&self, game_id: &GameId) -> Result<bool> {
        self.inner.confirm_cancellation(game_id).await
    }

    /// Begin a run on `entry` and hand out its handle and fresh token.
    fn reserve(
        entry: &mut JobEntry,
        mode: SyncMode,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(JobHandle, CancellationToken)> {
        entry.job.begin_run(mode, now)?;
        entry.token.cancel();
        entry.token = CancellationToken::new();
        entry.publish();
        Ok((entry.handle(), entry.token.clone()))
    }
}

impl RunnerInner {
    /// Ask the engine to begin the run, then hand it to a poll task.
    async fn launch(
        self: &Arc<Self>,
        game_id: GameId,
        mode: SyncMode,
        run: u64,
        token: CancellationToken,
    ) {
        self.emit(SyncEvent::Started {
            game_id: game_id.to_string(),
            dry_run: mode.is_dry_run(),
            run,
        });

        let started = match mode {
            SyncMode::DryRun => self.engine.start_dry_run(&game_id).await,
            SyncMode::Real => self.engine.start_sync(&game_id).await,
        };

        if let Err(e) = started {
            let err = SyncError::EngineStart(e.to_string());
            error!(game_id = %game_id, error = %err, "Sync engine failed to start");
            self.fail_run(&game_id, mode, run, &e.to_string()).await;
            return;
        }

        if token.is_cancelled() {
            // Cancelled before the engine was running.
            if let Err(e) = self.engine.cancel_sync(&game_id).await {
                warn!(game_id = %game_id, error = %e, "Engine did not acknowledge cancellation");
            }
            return;
        }

        info!(game_id = %game_id, %mode, run, "Sync started");

        let inner = Arc::clone(self);
        core_async::task::spawn(async move {
            inner.poll_loop(game_id, mode, run, token).await;
        });
    }

    #[instrument(skip(self, token), fields(game_id = %game_id, mode = %mode))]
    async fn poll_loop(&self, game_id: GameId, mode: SyncMode, run: u64, token: CancellationToken) {
        let mut formatter = MessageFormatter::new(mode);

        loop {
            core_async::time::sleep(self.poll_interval).await;
            if token.is_cancelled() {
                debug!("Poll loop stopped by cancellation");
                return;
            }

            let polled = self.engine.poll_logs(&game_id).await;
            if token.is_cancelled() {
                debug!("Discarding poll result of a cancelled run");
                return;
            }

            let raw = match polled {
                Ok(raw) => raw,
                Err(e) => {
                    let err = SyncError::Poll(e.to_string());
                    error!(error = %err, "Polling the sync engine failed");
                    self.fail_run(&game_id, mode, run, &e.to_string()).await;
                    return;
                }
            };

            let Some(envelope) = decode_envelope(&raw) else {
                continue;
            };

            let mut lines = formatter.format(&envelope.message);
            if envelope.finished {
                lines.extend(formatter.finish());
                self.finish_run(&game_id, mode, run, lines).await;
                return;
            }

            if !self.append(&game_id, run, lines).await {
                debug!("Run superseded, stopping poll loop");
                return;
            }
        }
    }

    /// Append lines to the current run. Returns `false` if `run` is stale.
    async fn append(&self, game_id: &GameId, run: u64, lines: Vec<String>) -> bool {
        let mut jobs = self.jobs.lock().await;
        let Some(entry) = jobs.get_mut(game_id).filter(|entry| entry.is_current(run)) else {
            return false;
        };

        if lines.is_empty() {
            return true;
        }

        if entry.job.append_lines(lines.clone()).is_err() {
            return false;
        }
        drop(jobs);

        self.emit(SyncEvent::Progress {
            game_id: game_id.to_string(),
            lines,
        });
        true
    }

    async fn finish_run(&self, game_id: &GameId, mode: SyncMode, run: u64, lines: Vec<String>) {
        let now = self.clock.now();
        let event = {
            let mut jobs = self.jobs.lock().await;
            let Some(entry) = jobs.get_mut(game_id).filter(|entry| entry.is_current(run)) else {
                debug!(game_id = %game_id, run, "Dropping terminal record of a stale run");
                return;
            };

            let appended = entry.job.append_lines(lines.clone());
            let settled = match mode {
                SyncMode::DryRun => entry.job.await_confirmation(now),
                SyncMode::Real => entry.job.succeed(now),
            };
            if let Err(e) = appended.and(settled) {
                error!(game_id = %game_id, error = %e, "Could not settle finished run");
                return;
            }
            entry.publish();

            match mode {
                SyncMode::DryRun => SyncEvent::AwaitingConfirmation {
                    game_id: game_id.to_string(),
                    preview_lines: entry.job.messages.len(),
                },
                SyncMode::Real => SyncEvent::Completed {
                    game_id: game_id.to_string(),
                    dry_run: false,
                },
            }
        };

        if !lines.is_empty() {
            self.emit(SyncEvent::Progress {
                game_id: game_id.to_string(),
                lines,
            });
        }
        self.emit(event);
        info!(game_id = %game_id, %mode, "Sync run finished");
    }

    async fn fail_run(&self, game_id: &GameId, mode: SyncMode, run: u64, error: &str) {
        let message = failure_message(mode, error);
        {
            let mut jobs = self.jobs.lock().await;
            let Some(entry) = jobs.get_mut(game_id).filter(|entry| entry.is_current(run)) else {
                debug!(game_id = %game_id, run, "Dropping failure of a stale run");
                return;
            };

            if let Err(e) = entry.job.fail(message.clone(), self.clock.now()) {
                error!(game_id = %game_id, error = %e, "Could not record failure");
                return;
            }
            entry.publish();
        }

        warn!(game_id = %game_id, %mode, %message, "Sync run failed");
        self.emit(SyncEvent::Failed {
            game_id: game_id.to_string(),
            message,
            dry_run: mode.is_dry_run(),
        });
    }

    async fn confirm_cancellation(&self, game_id: &GameId) -> Result<bool> {
        let request = ConfirmationRequest::new(
            format!("Are you sure you want to cancel sync'ing {game_id}?"),
            CANCEL_SUBTITLE,
        );

        self.prompt
            .confirm(request)
            .await
            .map_err(|e| SyncError::Confirmation(e.to_string()))
    }

    fn emit(&self, event: SyncEvent) {
        self.event_bus.emit(CoreEvent::Sync(event)).ok();
    }
}

fn not_found(game_id: &GameId) -> SyncError {
    SyncError::JobNotFound {
        game_id: game_id.to_string(),
    }
}
