//! User Confirmation Abstraction
//!
//! Destructive actions (aborting a real sync that is partially applied,
//! closing a batch with a job in flight) go through the host's confirmation
//! dialog.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Content of a confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub title: String,
    pub subtitle: String,
}

impl ConfirmationRequest {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
        }
    }
}

/// Ask the user to confirm an action.
///
/// Returns `Ok(true)` when the user accepts. A dismissed dialog is a refusal,
/// not an error.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, request: ConfirmationRequest) -> Result<bool>;
}

/// Prompt that answers every request with a fixed decision.
///
/// Useful for headless hosts and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedConfirmation(pub bool);

#[async_trait]
impl ConfirmationPrompt for FixedConfirmation {
    async fn confirm(&self, _request: ConfirmationRequest) -> Result<bool> {
        Ok(self.0)
    }
}
