//! rclone-backed Sync Engine

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    EngineLogEnvelope, GameId, SettingsStore, SyncEngine,
};
use core_async::sync::{mpsc, CancellationToken, Mutex, RwLock};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Exit code rclone bisync uses when it needs a `--resync` run.
const BISYNC_NEEDS_RESYNC: i32 = 2;

const UNKNOWN_GAME: &str = "failed to find progress event";

/// Flag name fragments whose values are never logged.
const SECRET_FLAG_MARKERS: &[&str] = &["token", "pass", "secret", "key"];

/// Where a game's saves live locally and on the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLocation {
    pub local_path: PathBuf,
    /// Path inside the remote, without the `remote:` prefix.
    pub remote_path: String,
}

impl GameLocation {
    pub fn new(local_path: impl Into<PathBuf>, remote_path: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
        }
    }
}

/// How rclone is invoked.
#[derive(Debug, Clone)]
pub struct RcloneOptions {
    pub binary: PathBuf,
    /// Name of the configured rclone remote.
    pub remote: String,
    pub use_bisync: bool,
    pub verbose: bool,
    /// Extra flags, whitespace separated, passed before the subcommand.
    pub custom_flags: String,
}

impl Default for RcloneOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("rclone"),
            remote: String::new(),
            use_bisync: false,
            verbose: false,
            custom_flags: String::new(),
        }
    }
}

impl RcloneOptions {
    /// Arguments for one run.
    pub fn build_args(&self, location: &GameLocation, dry_run: bool, resync: bool) -> Vec<String> {
        let mut args = vec!["--use-json-log".to_string()];
        if self.verbose {
            args.push("-vv".to_string());
        }
        if dry_run {
            args.push("--dry-run".to_string());
        }
        args.extend(self.custom_flags.split_whitespace().map(str::to_string));

        let subcommand = if self.use_bisync { "bisync" } else { "sync" };
        args.push(subcommand.to_string());
        args.push(location.local_path.to_string_lossy().into_owned());
        args.push(format!("{}:{}", self.remote, location.remote_path));

        if resync {
            args.push("--resync".to_string());
        }
        args
    }
}

/// `args` joined for logging, with credential flag values masked.
fn redacted(args: &[String]) -> String {
    let is_secret = |flag: &str| {
        flag.starts_with("--") && SECRET_FLAG_MARKERS.iter().any(|m| flag.contains(m))
    };

    let mut out = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            out.push("[REDACTED]".to_string());
            mask_next = false;
            continue;
        }
        match arg.split_once('=') {
            Some((flag, _)) if is_secret(flag) => out.push(format!("{flag}=[REDACTED]")),
            None if is_secret(arg) => {
                out.push(arg.clone());
                mask_next = true;
            }
            _ => out.push(arg.clone()),
        }
    }
    out.join(" ")
}

/// Output of a finished run, queued for `poll_logs`.
#[derive(Debug)]
enum RunMessage {
    Progress(String),
    Finished(String),
    Failed(String),
}

struct ActiveRun {
    receiver: mpsc::UnboundedReceiver<RunMessage>,
    cancel: CancellationToken,
}

/// [`SyncEngine`] driving the rclone command line tool.
///
/// Each start spawns rclone on a background task; its output is queued per
/// game and handed out one record per `poll_logs` call.
///
/// # Example
///
/// ```ignore
/// let engine = RcloneSyncEngine::new(RcloneOptions {
///     remote: "gdrive".into(),
///     ..Default::default()
/// });
/// engine.register_game(GameId::from("hades"), GameLocation::new(save_dir, "saves/hades")).await;
/// engine.start_dry_run(&GameId::from("hades")).await?;
/// ```
pub struct RcloneSyncEngine {
    options: RcloneOptions,
    settings: Option<Arc<dyn SettingsStore>>,
    locations: RwLock<HashMap<GameId, GameLocation>>,
    runs: Mutex<HashMap<GameId, ActiveRun>>,
}

impl RcloneSyncEngine {
    pub fn new(options: RcloneOptions) -> Self {
        Self {
            options,
            settings: None,
            locations: RwLock::new(HashMap::new()),
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Read the bisync toggle and remote name from `settings` on every start.
    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub async fn register_game(&self, game: GameId, location: GameLocation) {
        self.locations.write().await.insert(game, location);
    }

    pub async fn location(&self, game: &GameId) -> Option<GameLocation> {
        self.locations.read().await.get(game).cloned()
    }

    async fn effective_options(&self) -> Result<RcloneOptions> {
        let mut options = self.options.clone();
        if let Some(settings) = &self.settings {
            let settings = settings.get_sync_settings().await?;
            options.use_bisync = settings.use_bi_sync;
            if !settings.cloud.is_empty() {
                options.remote = settings.cloud;
            }
        }
        Ok(options)
    }

    async fn launch(&self, game: &GameId, dry_run: bool) -> Result<()> {
        let location = self
            .location(game)
            .await
            .ok_or_else(|| BridgeError::NotFound(format!("No save location for {game}")))?;
        let options = self.effective_options().await?;

        tokio::fs::create_dir_all(&location.local_path).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        if let Some(previous) = self.runs.lock().await.insert(
            game.clone(),
            ActiveRun {
                receiver,
                cancel: cancel.clone(),
            },
        ) {
            previous.cancel.cancel();
        }

        sender.send(RunMessage::Progress(format!("Syncing: {game}"))).ok();

        info!(game = %game, dry_run, bisync = options.use_bisync, "Starting rclone");
        debug!(
            game = %game,
            args = %redacted(&options.build_args(&location, dry_run, false)),
            "rclone command"
        );
        let game = game.clone();
        core_async::task::spawn(async move {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(game = %game, "rclone run cancelled");
                    return;
                }
                outcome = run_to_completion(&options, &location, dry_run) => outcome,
            };
            sender.send(message).ok();
        });

        Ok(())
    }
}

/// Run rclone, rerunning bisync with `--resync` when it asks for one.
async fn run_to_completion(options: &RcloneOptions, location: &GameLocation, dry_run: bool) -> RunMessage {
    match run_once(options, location, dry_run, false).await {
        Ok(RunResult::Success(output)) => RunMessage::Finished(output),
        Ok(RunResult::Failure { code, stderr }) => {
            if options.use_bisync && code == Some(BISYNC_NEEDS_RESYNC) {
                info!("Bisync requested a resync, rerunning");
                match run_once(options, location, dry_run, true).await {
                    Ok(RunResult::Success(output)) => RunMessage::Finished(output),
                    Ok(RunResult::Failure { stderr, .. }) => RunMessage::Failed(stderr),
                    Err(e) => RunMessage::Failed(e.to_string()),
                }
            } else {
                RunMessage::Failed(stderr)
            }
        }
        Err(e) => RunMessage::Failed(e.to_string()),
    }
}

enum RunResult {
    Success(String),
    Failure { code: Option<i32>, stderr: String },
}

async fn run_once(
    options: &RcloneOptions,
    location: &GameLocation,
    dry_run: bool,
    resync: bool,
) -> std::io::Result<RunResult> {
    let output = Command::new(&options.binary)
        .args(options.build_args(location, dry_run, resync))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        warn!(code = ?output.status.code(), "rclone exited with an error");
        return Ok(RunResult::Failure {
            code: output.status.code(),
            stderr,
        });
    }

    // rclone reports what it did on stderr.
    if stderr.is_empty() {
        Ok(RunResult::Success(
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    } else {
        Ok(RunResult::Success(stderr))
    }
}

#[async_trait]
impl SyncEngine for RcloneSyncEngine {
    async fn start_sync(&self, game: &GameId) -> Result<()> {
        self.launch(game, false).await
    }

    async fn start_dry_run(&self, game: &GameId) -> Result<()> {
        self.launch(game, true).await
    }

    async fn poll_logs(&self, game: &GameId) -> Result<String> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .get_mut(game)
            .ok_or_else(|| BridgeError::NotFound(UNKNOWN_GAME.to_string()))?;

        let message = match run.receiver.try_recv() {
            Ok(message) => message,
            Err(mpsc::error::TryRecvError::Empty) => return Ok(String::new()),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                runs.remove(game);
                return Err(BridgeError::OperationFailed(
                    "rclone run ended without a result".to_string(),
                ));
            }
        };

        match message {
            RunMessage::Progress(text) => EngineLogEnvelope::progress(text).to_json(),
            RunMessage::Finished(text) => {
                runs.remove(game);
                EngineLogEnvelope::finished(text).to_json()
            }
            RunMessage::Failed(stderr) => {
                runs.remove(game);
                Err(BridgeError::OperationFailed(stderr))
            }
        }
    }

    async fn cancel_sync(&self, game: &GameId) -> Result<()> {
        if let Some(run) = self.runs.lock().await.remove(game) {
            run.cancel.cancel();
            info!(game = %game, "Cancelled rclone run");
        }
        Ok(())
    }
}
