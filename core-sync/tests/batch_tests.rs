//! Integration tests for multi-game batch syncs.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bridge_traits::{BridgeError, GameId, SettingsStore, SyncSettings};
use common::{
    games, pending, runner, runner_with, Call, MemorySettings, MockPrompt, MockSelection,
    ScriptedEngine, Step,
};
use core_runtime::events::EventBus;
use core_sync::{BatchSyncOrchestrator, JobStatus, SyncError, SyncJobRunner, SyncMode};

/// Selection store accepting any commit, starting from `saved`.
fn selection(saved: &[&str]) -> (MockSelection, Arc<Mutex<Vec<Vec<GameId>>>>) {
    let saved = games(saved);
    let commits = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&commits);

    let mut store = MockSelection::new();
    store
        .expect_get_selection()
        .returning(move || Ok(saved.clone()));
    store.expect_commit_selection().returning(move |games| {
        recorded.lock().unwrap().push(games.to_vec());
        Ok(())
    });
    (store, commits)
}

fn orchestrator(
    runner: SyncJobRunner,
    settings: impl SettingsStore + 'static,
    store: MockSelection,
) -> BatchSyncOrchestrator {
    BatchSyncOrchestrator::new(runner, Arc::new(settings), Arc::new(store), EventBus::new(256))
}

async fn wait_for_active(batch: &BatchSyncOrchestrator) -> GameId {
    loop {
        if let Some(game) = batch.active_job().await {
            return game;
        }
        core_async::time::sleep(Duration::from_millis(1)).await;
    }
}

#[core_async::test]
async fn test_failure_does_not_stop_the_batch() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("a", vec![Step::Empty, Step::Finished("a done".to_string())]);
    engine.script(
        "b",
        vec![
            Step::Progress("b starting".to_string()),
            Step::Error("exit status 1".to_string()),
        ],
    );
    engine.script("c", vec![Step::Finished("c done".to_string())]);

    let runner = runner(engine.clone());
    let (store, _) = selection(&["a", "b", "c"]);
    let batch = orchestrator(runner.clone(), MemorySettings::with_dry_run(false), store);

    batch.open(games(&["a", "b", "c"])).await.unwrap();
    let report = batch.run_selected().await.unwrap();

    assert_eq!(report.mode, SyncMode::Real);
    assert!(!report.cancelled);
    let statuses: Vec<JobStatus> = report.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Succeeded, JobStatus::Failed, JobStatus::Succeeded]
    );
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);

    // C only starts once B has settled.
    let last_b_poll = engine.last_position(&Call::Poll("b".to_string())).unwrap();
    let c_start = engine.position(&Call::StartSync("c".to_string())).unwrap();
    assert!(c_start > last_b_poll);

    let a_start = engine.position(&Call::StartSync("a".to_string())).unwrap();
    let b_start = engine.position(&Call::StartSync("b".to_string())).unwrap();
    let last_a_poll = engine.last_position(&Call::Poll("a".to_string())).unwrap();
    assert!(a_start < last_a_poll && last_a_poll < b_start);

    let b = runner.snapshot(&GameId::from("b")).await.unwrap();
    assert_eq!(
        b.messages,
        vec![
            "b starting",
            "Error while performing sync: Bridge operation failed: exit status 1"
        ]
    );
    assert!(!batch.is_running().await);
}

#[core_async::test]
async fn test_cancel_between_jobs_leaves_rest_idle() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("a", vec![Step::Finished("a done".to_string())]);
    engine.script("b", vec![Step::Finished("b done".to_string())]);
    engine.script("c", vec![Step::Finished("c done".to_string())]);

    let runner = runner(engine.clone());
    let (store, _) = selection(&["a", "b", "c"]);
    let batch = orchestrator(runner.clone(), MemorySettings::with_dry_run(false), store);
    batch.open(games(&["a", "b", "c"])).await.unwrap();

    let handle = batch.cancel_handle();
    engine.on_finished(move |game| {
        if game.as_str() == "a" {
            handle.cancel();
        }
    });

    let report = batch.run_selected().await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.status_of(&GameId::from("a")), Some(JobStatus::Succeeded));
    assert_eq!(runner.status(&GameId::from("b")).await, Some(JobStatus::Idle));
    assert_eq!(runner.status(&GameId::from("c")).await, Some(JobStatus::Idle));
    assert!(engine.position(&Call::StartSync("b".to_string())).is_none());

    // A cancelled run never enables the carryover.
    assert!(!batch.dry_run_carryover().await);
}

#[core_async::test]
async fn test_dry_run_carryover() {
    let engine = Arc::new(ScriptedEngine::new());
    for game in ["a", "b"] {
        engine.script(game, vec![Step::Finished(pending("save.sav", 1_048_576))]);
    }

    let runner = runner(engine.clone());
    let (store, _) = selection(&["a", "b"]);
    let batch = orchestrator(runner.clone(), MemorySettings::with_dry_run(true), store);
    batch.open(games(&["a", "b"])).await.unwrap();

    let preview = batch.run_selected().await.unwrap();
    assert_eq!(preview.mode, SyncMode::DryRun);
    assert_eq!(preview.succeeded(), 2);
    assert!(batch.dry_run_carryover().await);

    // Previews are settled, not left waiting.
    let a = runner.snapshot(&GameId::from("a")).await.unwrap();
    assert_eq!(a.status, JobStatus::Succeeded);
    assert_eq!(a.messages, vec!["PENDING: copy - save.sav; size 1MB"]);

    let real = batch.run_selected().await.unwrap();
    assert_eq!(real.mode, SyncMode::Real);
    assert!(!batch.dry_run_carryover().await);
    assert!(engine.position(&Call::StartSync("a".to_string())).is_some());

    // Back to previewing after a real run.
    let again = batch.run_selected().await.unwrap();
    assert_eq!(again.mode, SyncMode::DryRun);
}

#[core_async::test]
async fn test_selection_change_clears_carryover() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("a", vec![Step::Finished(String::new())]);
    engine.script("b", vec![Step::Finished(String::new())]);

    let (store, _) = selection(&["a"]);
    let batch = orchestrator(runner(engine), MemorySettings::with_dry_run(true), store);
    batch.open(games(&["a", "b"])).await.unwrap();

    batch.run_selected().await.unwrap();
    assert!(batch.dry_run_carryover().await);

    batch.set_checked(&GameId::from("b"), true).await;
    assert!(!batch.dry_run_carryover().await);

    let report = batch.run_selected().await.unwrap();
    assert_eq!(report.mode, SyncMode::DryRun);
    assert_eq!(report.outcomes.len(), 2);
}

#[core_async::test]
async fn test_open_checks_saved_games() {
    let (store, _) = selection(&["b", "not-listed"]);
    let batch = orchestrator(
        runner(Arc::new(ScriptedEngine::new())),
        MemorySettings::default(),
        store,
    );

    batch.open(games(&["a", "b", "c"])).await.unwrap();
    assert_eq!(batch.selected().await, games(&["b"]));

    batch.select_all().await;
    assert_eq!(batch.selected().await, games(&["a", "b", "c"]));

    batch.set_checked(&GameId::from("b"), false).await;
    batch.set_checked(&GameId::from("unknown"), true).await;
    assert_eq!(batch.selected().await, games(&["a", "c"]));

    batch.unselect_all().await;
    assert!(batch.selected().await.is_empty());
}

#[core_async::test]
async fn test_open_resets_jobs() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("a", vec![Step::Error("boom".to_string())]);
    let runner = runner(engine);

    let mut handle = runner.start(GameId::from("a"), SyncMode::Real).await.unwrap();
    assert_eq!(handle.settled().await, JobStatus::Failed);

    let (store, _) = selection(&[]);
    let batch = orchestrator(runner.clone(), MemorySettings::default(), store);
    batch.open(games(&["a"])).await.unwrap();

    let job = runner.snapshot(&GameId::from("a")).await.unwrap();
    assert_eq!(job.status, JobStatus::Idle);
    assert!(job.messages.is_empty());
}

#[core_async::test]
async fn test_open_selection_error() {
    let mut store = MockSelection::new();
    store
        .expect_get_selection()
        .returning(|| Err(BridgeError::NotFound("multisync_selection.json".to_string())));

    let batch = orchestrator(
        runner(Arc::new(ScriptedEngine::new())),
        MemorySettings::default(),
        store,
    );

    let err = batch.open(games(&["a"])).await.unwrap_err();
    assert!(matches!(err, SyncError::Selection(_)));
}

#[core_async::test]
async fn test_settings_error_starts_nothing() {
    struct BrokenSettings;

    #[async_trait::async_trait]
    impl SettingsStore for BrokenSettings {
        async fn get_sync_settings(&self) -> bridge_traits::Result<SyncSettings> {
            Err(BridgeError::OperationFailed("corrupt preferences".to_string()))
        }

        async fn commit_sync_settings(&self, _settings: &SyncSettings) -> bridge_traits::Result<()> {
            Ok(())
        }
    }

    let engine = Arc::new(ScriptedEngine::new());
    let (store, _) = selection(&["a"]);
    let batch = orchestrator(runner(engine.clone()), BrokenSettings, store);
    batch.open(games(&["a"])).await.unwrap();

    let err = batch.run_selected().await.unwrap_err();
    assert!(matches!(err, SyncError::Settings(_)));
    assert!(engine.calls().is_empty());
    assert!(!batch.is_running().await);
}

#[core_async::test]
async fn test_close_declined_keeps_batch_running() {
    let engine = Arc::new(ScriptedEngine::new());
    let mut script = vec![Step::Empty; 20];
    script.push(Step::Finished("a done".to_string()));
    engine.script("a", script);

    let mut prompt = MockPrompt::new();
    prompt.expect_confirm().times(1).returning(|_| Ok(false));
    let (store, commits) = selection(&["a"]);
    let batch = Arc::new(orchestrator(
        runner_with(engine.clone(), Arc::new(prompt)),
        MemorySettings::with_dry_run(false),
        store,
    ));
    batch.open(games(&["a"])).await.unwrap();

    let running = Arc::clone(&batch);
    let task = core_async::task::spawn(async move { running.run_selected().await });

    assert_eq!(wait_for_active(&batch).await, GameId::from("a"));
    assert!(matches!(
        batch.run_selected().await,
        Err(SyncError::BatchInProgress)
    ));
    assert!(!batch.close().await.unwrap());

    let report = task.await.unwrap().unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(commits.lock().unwrap().clone(), vec![games(&["a"])]);
}

#[core_async::test]
async fn test_close_confirmed_cancels_batch() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("a", vec![]);
    engine.script("b", vec![Step::Finished("b done".to_string())]);

    let mut prompt = MockPrompt::new();
    prompt.expect_confirm().times(1).returning(|_| Ok(true));
    let (store, commits) = selection(&["a", "b"]);
    let batch = Arc::new(orchestrator(
        runner_with(engine.clone(), Arc::new(prompt)),
        MemorySettings::with_dry_run(false),
        store,
    ));
    batch.open(games(&["a", "b"])).await.unwrap();

    let running = Arc::clone(&batch);
    let task = core_async::task::spawn(async move { running.run_selected().await });

    wait_for_active(&batch).await;
    assert!(batch.close().await.unwrap());

    let report = task.await.unwrap().unwrap();
    assert!(report.cancelled);
    assert_eq!(report.status_of(&GameId::from("a")), Some(JobStatus::Cancelled));
    assert_eq!(report.status_of(&GameId::from("b")), None);
    assert!(engine.calls().contains(&Call::Cancel("a".to_string())));
    assert_eq!(commits.lock().unwrap().len(), 1);
}

#[core_async::test]
async fn test_cancel_aborts_active_dry_run() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("a", vec![]);

    let mut prompt = MockPrompt::new();
    // Dry runs are aborted without asking.
    prompt.expect_confirm().never();
    let (store, _) = selection(&["a", "b"]);
    let batch = Arc::new(orchestrator(
        runner_with(engine.clone(), Arc::new(prompt)),
        MemorySettings::with_dry_run(true),
        store,
    ));
    batch.open(games(&["a", "b"])).await.unwrap();

    let running = Arc::clone(&batch);
    let task = core_async::task::spawn(async move { running.run_selected().await });

    wait_for_active(&batch).await;
    batch.cancel().await.unwrap();

    let report = task.await.unwrap().unwrap();
    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 1);
    assert!(engine.position(&Call::StartDryRun("b".to_string())).is_none());
}

#[core_async::test]
async fn test_dropped_run_releases_the_session() {
    let engine = Arc::new(ScriptedEngine::new());
    engine.script("a", vec![]);

    let (store, _) = selection(&["a"]);
    let batch = orchestrator(runner(engine.clone()), MemorySettings::with_dry_run(false), store);
    batch.open(games(&["a"])).await.unwrap();

    let timed_out = core_async::time::timeout(Duration::from_millis(20), batch.run_selected()).await;
    assert!(timed_out.is_err());
    assert!(!batch.is_running().await);
    assert_eq!(batch.active_job().await, None);

    let game = GameId::from("a");
    if batch.runner().status(&game).await.is_some_and(|s| s.is_active()) {
        batch.runner().abort(&game).await.unwrap();
    }

    engine.script("a", vec![Step::Finished("a done".to_string())]);
    batch.open(games(&["a"])).await.unwrap();
    let report = batch.run_selected().await.unwrap();
    assert_eq!(report.succeeded(), 1);
}
