//! Artifact producers.
//!
//! - `CommandBuilder` runs the configured bundler command and reads its output
//! - `StoreBundler` packs the extension's own files (theme app extensions)

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{ExtensionBuilder, PushError};
use crate::asset::{AssetContent, AssetStore};
use crate::utils::exec::{BUNDLER_FILTER, Cmd};

fn check_size(size: u64, limit: Option<u64>) -> Result<(), PushError> {
    match limit {
        Some(limit) if size > limit => Err(PushError::TooLarge { size, limit }),
        _ => Ok(()),
    }
}

/// External "bundle this extension" command.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// Command line, run inside `dir`
    pub command: Option<String>,
    pub dir: PathBuf,
    /// Artifact written by the command, relative to `dir`
    pub output: PathBuf,
    pub size_limit: Option<u64>,
}

#[async_trait]
impl ExtensionBuilder for CommandBuilder {
    async fn build(&self) -> Result<Vec<u8>, PushError> {
        let this = self.clone();

        tokio::task::spawn_blocking(move || {
            if let Some(line) = &this.command {
                Cmd::from_shell_words(line)
                    .map_err(|e| PushError::Build(e.to_string()))?
                    .cwd(&this.dir)
                    .filter(&BUNDLER_FILTER)
                    .run()
                    .map_err(|e| PushError::Build(e.to_string()))?;
            }

            let path = this.dir.join(&this.output);
            let artifact = std::fs::read(&path)
                .map_err(|e| PushError::Build(format!("{}: {e}", path.display())))?;
            check_size(artifact.len() as u64, this.size_limit)?;
            Ok(artifact)
        })
        .await
        .map_err(|e| PushError::Build(format!("build task failed: {e}")))?
    }
}

/// Packs every file of an extension store as `[{key, value | attachment}]`.
pub struct StoreBundler {
    pub store: Arc<AssetStore>,
    pub size_limit: Option<u64>,
}

#[async_trait]
impl ExtensionBuilder for StoreBundler {
    async fn build(&self) -> Result<Vec<u8>, PushError> {
        let files: Vec<_> = self
            .store
            .keys()
            .into_iter()
            .filter_map(|key| self.store.get(key.as_str()))
            .map(|asset| match &asset.content {
                AssetContent::Text(text) => json!({"key": asset.key.as_str(), "value": text}),
                AssetContent::Binary(_) => {
                    json!({"key": asset.key.as_str(), "attachment": asset.content.to_attachment()})
                }
            })
            .collect();

        let artifact = serde_json::to_vec(&files).map_err(|e| PushError::Build(e.to_string()))?;
        check_size(artifact.len() as u64, self.size_limit)?;
        Ok(artifact)
    }
}
