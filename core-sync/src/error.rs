use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync for {game_id} is already {status}")]
    AlreadyActive { game_id: String, status: String },

    #[error("No sync job for {game_id}")]
    JobNotFound { game_id: String },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("A multi-sync run is already in progress")]
    BatchInProgress,

    #[error("Failed to start sync engine: {0}")]
    EngineStart(String),

    #[error("Failed to poll sync engine: {0}")]
    Poll(String),

    #[error("Failed to load sync settings: {0}")]
    Settings(String),

    #[error("Failed to access saved selection: {0}")]
    Selection(String),

    #[error("Confirmation prompt failed: {0}")]
    Confirmation(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
