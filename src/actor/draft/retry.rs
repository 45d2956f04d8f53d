//! Retry-after-reauthentication policy for draft pushes.

use std::sync::Arc;

use super::{DraftClient, PushError, PushSession, Reauthenticator};

/// Attempts per push, counting the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// `primary` pushes; `recovery` refreshes the token after an auth failure.
///
/// Only `Unauthorized` is retried, and only while attempts remain. Every
/// other outcome is returned as-is.
#[derive(Clone)]
pub struct RetryPolicy {
    pub primary: Arc<dyn DraftClient>,
    pub recovery: Arc<dyn Reauthenticator>,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(primary: Arc<dyn DraftClient>, recovery: Arc<dyn Reauthenticator>) -> Self {
        Self {
            primary,
            recovery,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Push `artifact`, refreshing `session.current_token` in place when the
    /// remote rejects it.
    pub async fn execute(&self, session: &mut PushSession, artifact: &[u8]) -> Result<(), PushError> {
        let mut attempt = 1;
        loop {
            match self.primary.push(session, artifact).await {
                Err(PushError::Unauthorized(reason)) if attempt < self.max_attempts => {
                    crate::debug!(
                        "push";
                        "{} unauthorized ({}), refreshing token",
                        session.extension_id,
                        reason
                    );
                    session.current_token = self.recovery.refresh().await?;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}
