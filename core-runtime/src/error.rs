//! Errors raised while assembling the core.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A tunable is out of range or logging could not be installed.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A required bridge was not injected and has no platform default.
    #[error("Missing {capability}: {message}")]
    CapabilityMissing { capability: String, message: String },

    /// A platform default could not be constructed.
    #[error("Runtime setup failed: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
