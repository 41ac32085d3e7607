//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridge_traits::{
    BridgeError, ConfirmationPrompt, ConfirmationRequest, EngineLogEnvelope, FixedConfirmation,
    GameId, Result, SelectionStore, SettingsStore, SyncEngine, SyncSettings, SystemClock,
};
use core_runtime::events::EventBus;
use core_sync::SyncJobRunner;
use mockall::mock;

/// One scripted `poll_logs` result.
#[derive(Debug, Clone)]
pub enum Step {
    Empty,
    Progress(String),
    Finished(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartSync(String),
    StartDryRun(String),
    Poll(String),
    Cancel(String),
}

type FinishHook = Arc<dyn Fn(&GameId) + Send + Sync>;

/// Engine replaying a per-game script of poll results.
///
/// Each start reloads the game's script; once it is exhausted polls return
/// `""`.
#[derive(Default)]
pub struct ScriptedEngine {
    plans: Mutex<HashMap<GameId, Vec<Step>>>,
    start_errors: Mutex<HashMap<GameId, String>>,
    queues: Mutex<HashMap<GameId, VecDeque<Step>>>,
    calls: Mutex<Vec<Call>>,
    on_finished: Mutex<Option<FinishHook>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, game: &str, steps: Vec<Step>) {
        self.plans.lock().unwrap().insert(GameId::from(game), steps);
    }

    pub fn fail_start(&self, game: &str, message: &str) {
        self.start_errors
            .lock()
            .unwrap()
            .insert(GameId::from(game), message.to_string());
    }

    /// Called whenever a `Finished` record is handed out.
    pub fn on_finished<F>(&self, hook: F)
    where
        F: Fn(&GameId) + Send + Sync + 'static,
    {
        *self.on_finished.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    pub fn last_position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().rposition(|c| c == call)
    }

    fn begin(&self, game: &GameId, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if let Some(message) = self.start_errors.lock().unwrap().get(game) {
            return Err(BridgeError::OperationFailed(message.clone()));
        }

        let steps = self
            .plans
            .lock()
            .unwrap()
            .get(game)
            .cloned()
            .unwrap_or_default();
        self.queues
            .lock()
            .unwrap()
            .insert(game.clone(), steps.into());
        Ok(())
    }
}

#[async_trait]
impl SyncEngine for ScriptedEngine {
    async fn start_sync(&self, game: &GameId) -> Result<()> {
        self.begin(game, Call::StartSync(game.to_string()))
    }

    async fn start_dry_run(&self, game: &GameId) -> Result<()> {
        self.begin(game, Call::StartDryRun(game.to_string()))
    }

    async fn poll_logs(&self, game: &GameId) -> Result<String> {
        self.calls.lock().unwrap().push(Call::Poll(game.to_string()));

        let step = self
            .queues
            .lock()
            .unwrap()
            .get_mut(game)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Empty);

        match step {
            Step::Empty => Ok(String::new()),
            Step::Progress(message) => Ok(EngineLogEnvelope::progress(message).to_json()?),
            Step::Finished(message) => {
                let hook = self.on_finished.lock().unwrap().clone();
                if let Some(hook) = hook {
                    hook(game);
                }
                Ok(EngineLogEnvelope::finished(message).to_json()?)
            }
            Step::Error(message) => Err(BridgeError::OperationFailed(message)),
        }
    }

    async fn cancel_sync(&self, game: &GameId) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Cancel(game.to_string()));
        self.queues.lock().unwrap().remove(game);
        Ok(())
    }
}

/// Settings store holding one value in memory.
#[derive(Default)]
pub struct MemorySettings {
    settings: Mutex<SyncSettings>,
}

impl MemorySettings {
    pub fn with_dry_run(perform_dry_run: bool) -> Self {
        Self {
            settings: Mutex::new(SyncSettings {
                perform_dry_run,
                ..SyncSettings::default()
            }),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get_sync_settings(&self) -> Result<SyncSettings> {
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn commit_sync_settings(&self, settings: &SyncSettings) -> Result<()> {
        *self.settings.lock().unwrap() = settings.clone();
        Ok(())
    }
}

mock! {
    pub Selection {}

    #[async_trait]
    impl SelectionStore for Selection {
        async fn get_selection(&self) -> Result<Vec<GameId>>;
        async fn commit_selection(&self, games: &[GameId]) -> Result<()>;
    }
}

mock! {
    pub Prompt {}

    #[async_trait]
    impl ConfirmationPrompt for Prompt {
        async fn confirm(&self, request: ConfirmationRequest) -> Result<bool>;
    }
}

pub const POLL: Duration = Duration::from_millis(1);

pub fn runner_with(engine: Arc<ScriptedEngine>, prompt: Arc<dyn ConfirmationPrompt>) -> SyncJobRunner {
    SyncJobRunner::new(engine, prompt, Arc::new(SystemClock), EventBus::new(256), POLL)
}

pub fn runner(engine: Arc<ScriptedEngine>) -> SyncJobRunner {
    runner_with(engine, Arc::new(FixedConfirmation(true)))
}

pub fn games(ids: &[&str]) -> Vec<GameId> {
    ids.iter().map(|id| GameId::from(*id)).collect()
}

pub fn pending(object: &str, size: u64) -> String {
    format!(r#"{{"msg":"Skipped copy","object":"{object}","skipped":"copy","size":{size}}}"#)
}
