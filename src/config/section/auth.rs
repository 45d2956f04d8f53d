//! `[auth]` section configuration.
//!
//! Tokens never live in the config file. The file names where to read them:
//!
//! ```toml
//! [auth]
//! token_env = "THEMEDEV_TOKEN"                       # admin or shptka_ token
//! storefront_token_env = "THEMEDEV_STOREFRONT_TOKEN"
//! token_command = "op read op://dev/shop/token"      # optional, wins over token_env
//! ```

use serde::Deserialize;

use crate::actor::draft::TokenCommand;
use crate::config::ConfigError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token_env: String,
    pub storefront_token_env: String,
    /// Command whose stdout is a fresh token
    pub token_command: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_env: "THEMEDEV_TOKEN".into(),
            storefront_token_env: "THEMEDEV_STOREFRONT_TOKEN".into(),
            token_command: None,
        }
    }
}

impl AuthConfig {
    /// Where a fresh token comes from on reauthentication.
    pub fn token_source(&self) -> TokenCommand {
        match &self.token_command {
            Some(command) => TokenCommand::Command(command.clone()),
            None => TokenCommand::Env(self.token_env.clone()),
        }
    }

    /// Token for the session start.
    pub fn token(&self) -> Result<String, ConfigError> {
        read_env(&self.token_env)
    }

    /// Storefront token; theme-access sessions do not need one.
    pub fn storefront_token(&self) -> Option<String> {
        read_env(&self.storefront_token_env).ok()
    }
}

fn read_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Validation(format!(
            "environment variable `{name}` is not set"
        ))),
    }
}
