//! Draft endpoint client and token refresh.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{DraftClient, PushError, PushSession, Reauthenticator};
use crate::utils::exec::Cmd;

#[derive(Debug, Default, Deserialize)]
struct UserError {
    #[serde(default)]
    field: Vec<String>,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct DraftResponse {
    #[serde(default, rename = "userErrors")]
    user_errors: Vec<UserError>,
}

/// JSON draft endpoint: one POST per push, bearer token auth.
pub struct HttpDraftClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    /// Extension config sent along with every draft
    config: Value,
}

impl HttpDraftClient {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        config: Value,
        timeout: Duration,
    ) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PushError::Fatal(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
            config,
        })
    }
}

#[async_trait]
impl DraftClient for HttpDraftClient {
    async fn push(&self, session: &PushSession, artifact: &[u8]) -> Result<(), PushError> {
        let body = json!({
            "apiKey": self.api_key,
            "registrationId": session.registration_id,
            "config": self.config,
            "context": BASE64.encode(artifact),
        });

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&session.current_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PushError::Transient(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PushError::Unauthorized(format!("HTTP {}", status.as_u16())));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PushError::Fatal(format!(
                "extension registration {} not found",
                session.registration_id
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PushError::Transient(format!("HTTP {}: {text}", status.as_u16())));
        }

        let parsed: DraftResponse = response
            .json()
            .await
            .map_err(|e| PushError::Transient(format!("malformed draft response: {e}")))?;
        if parsed.user_errors.is_empty() {
            return Ok(());
        }

        Err(PushError::UserErrors(
            parsed
                .user_errors
                .into_iter()
                .map(|e| {
                    if e.field.is_empty() {
                        e.message
                    } else {
                        format!("{}: {}", e.field.join("."), e.message)
                    }
                })
                .collect(),
        ))
    }
}

/// Token source: a configured command (stdout is the token) or an
/// environment variable re-read on every refresh.
#[derive(Debug, Clone)]
pub enum TokenCommand {
    Command(String),
    Env(String),
}

#[async_trait]
impl Reauthenticator for TokenCommand {
    async fn refresh(&self) -> Result<String, PushError> {
        let token = match self {
            Self::Env(var) => std::env::var(var)
                .map_err(|_| PushError::Unauthorized(format!("environment variable {var} is not set")))?,
            Self::Command(line) => {
                let line = line.clone();
                tokio::task::spawn_blocking(move || {
                    let output = Cmd::from_shell_words(&line)?.run()?;
                    anyhow::Ok(String::from_utf8_lossy(&output.stdout).into_owned())
                })
                .await
                .map_err(|e| PushError::Unauthorized(format!("token command: {e}")))?
                .map_err(|e| PushError::Unauthorized(format!("token command: {e}")))?
            }
        };

        let token = token.trim().to_string();
        if token.is_empty() {
            return Err(PushError::Unauthorized("token source returned an empty token".into()));
        }
        Ok(token)
    }
}
