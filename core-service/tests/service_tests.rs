use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::{
    BridgeError, EngineLogEnvelope, FixedConfirmation, GameId, SelectionStore, SettingsStore,
    SyncEngine, SyncSettings,
};
use core_runtime::SyncEvent;
use core_service::{CoreConfig, CoreError, CoreEvent, CoreService, JobStatus, SyncMode};
use core_sync::SyncError;
use mockall::mock;
use std::time::Duration;

mock! {
    Engine {}

    #[async_trait]
    impl SyncEngine for Engine {
        async fn start_sync(&self, game: &GameId) -> bridge_traits::Result<()>;
        async fn start_dry_run(&self, game: &GameId) -> bridge_traits::Result<()>;
        async fn poll_logs(&self, game: &GameId) -> bridge_traits::Result<String>;
        async fn cancel_sync(&self, game: &GameId) -> bridge_traits::Result<()>;
    }
}

mock! {
    Settings {}

    #[async_trait]
    impl SettingsStore for Settings {
        async fn get_sync_settings(&self) -> bridge_traits::Result<SyncSettings>;
        async fn commit_sync_settings(&self, settings: &SyncSettings) -> bridge_traits::Result<()>;
    }
}

mock! {
    Selection {}

    #[async_trait]
    impl SelectionStore for Selection {
        async fn get_selection(&self) -> bridge_traits::Result<Vec<GameId>>;
        async fn commit_selection(&self, games: &[GameId]) -> bridge_traits::Result<()>;
    }
}

fn service(engine: MockEngine, settings: MockSettings) -> CoreService {
    CoreService::bootstrap(
        CoreConfig::builder()
            .engine(Arc::new(engine))
            .settings_store(Arc::new(settings))
            .selection_store(Arc::new(MockSelection::new()))
            .confirmation_prompt(Arc::new(FixedConfirmation(true)))
            .poll_interval(Duration::from_millis(1)),
    )
    .unwrap()
}

#[test]
fn test_missing_engine_is_reported() {
    let result = CoreService::bootstrap(
        CoreConfig::builder().confirmation_prompt(Arc::new(FixedConfirmation(true))),
    );

    match result {
        Err(CoreError::CapabilityMissing { capability, .. }) => assert_eq!(capability, "SyncEngine"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("service built without an engine"),
    }
}

#[test]
fn test_search_uses_configured_threshold() {
    let service = service(MockEngine::new(), MockSettings::new());
    let games = ["Hades", "Hollow Knight", "Celeste"];

    let results = service.search("hk", &games);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].candidate, "Hollow Knight");
    assert!(results[0].result.matched);

    assert_eq!(service.search("  ", &games).len(), 3);
}

#[core_async::test]
async fn test_runner_events_reach_subscribers() {
    let mut engine = MockEngine::new();
    engine.expect_start_sync().times(1).returning(|_| Ok(()));
    engine
        .expect_poll_logs()
        .returning(|_| EngineLogEnvelope::finished("Copied save.sav").to_json());

    let service = service(engine, MockSettings::new());
    let mut events = service.events().for_game("hades");

    let mut handle = service
        .runner()
        .start(GameId::from("hades"), SyncMode::Real)
        .await
        .unwrap();
    assert_eq!(handle.settled().await, JobStatus::Succeeded);

    let first = events.recv().await.unwrap();
    assert!(matches!(
        first,
        CoreEvent::Sync(SyncEvent::Started { dry_run: false, run: 1, .. })
    ));
}

#[core_async::test]
async fn test_settings_errors_map_to_sync_errors() {
    let mut settings = MockSettings::new();
    settings
        .expect_get_sync_settings()
        .returning(|| Err(BridgeError::OperationFailed("disk full".to_string())));

    let service = service(MockEngine::new(), settings);
    let err = service.sync_settings().await.unwrap_err();
    assert!(matches!(err, CoreError::Sync(SyncError::Settings(_))));
}

#[cfg(feature = "desktop-shims")]
#[core_async::test]
async fn test_desktop_store_injected_by_default() {
    let dir = tempfile::TempDir::new().unwrap();
    let service = CoreService::bootstrap(
        CoreConfig::builder()
            .engine(Arc::new(MockEngine::new()))
            .confirmation_prompt(Arc::new(FixedConfirmation(true)))
            .config_dir(dir.path()),
    )
    .unwrap();

    let defaults = service.sync_settings().await.unwrap();
    assert!(defaults.perform_dry_run);

    let updated = SyncSettings {
        cloud: "gdrive".to_string(),
        ..defaults
    };
    service.commit_sync_settings(&updated).await.unwrap();
    assert_eq!(service.sync_settings().await.unwrap(), updated);
    assert!(dir.path().join("cloudsave_perfs.json").exists());
}
