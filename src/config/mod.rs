//! Session configuration for `themedev.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── app        # [app]
//! │   ├── auth       # [auth]
//! │   ├── extension  # [[extensions]]
//! │   ├── serve      # [serve]
//! │   ├── store      # [store]
//! │   └── sync       # [sync], [watch]
//! ├── types/         # ConfigError, ConfigDiagnostics
//! └── mod.rs         # DevConfig (this file)
//! ```
//!
//! The config file is found by walking up from the cwd. The project root is
//! the directory holding it unless `--root` says otherwise. CLI flags
//! override file values for the session only.

pub mod section;
pub mod types;
mod util;

use util::find_config_file;

pub use section::{
    AppConfig, AuthConfig, ExtensionConfig, ExtensionKind, ServeConfig, StoreConfig, SyncConfig,
    WatchConfig,
};
pub use types::{ConfigDiagnostics, ConfigError};

use crate::{
    cli::{Cli, DevArgs},
    log,
};
use anyhow::{Context, Result};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing themedev.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Theme root directory (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub extensions: Vec<ExtensionConfig>,
}

impl DevConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd for the config file, applies the `dev`
    /// flags and validates the result.
    pub fn load(cli: &Cli) -> Result<Self> {
        let Some(config_path) = find_config_file(&cli.config) else {
            return Err(ConfigError::Validation(format!(
                "config file '{}' not found in this directory or any parent",
                cli.config.display()
            ))
            .into());
        };

        let mut config = Self::from_path(&config_path)?;
        config.config_path = crate::utils::path::normalize_path(&config_path);
        config.finalize(cli.dev_args())?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve paths and apply CLI overrides.
    fn finalize(&mut self, args: &DevArgs) -> Result<()> {
        let config_dir = self
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let root = match &args.root {
            Some(root) => crate::utils::path::resolve_root(root, &config_dir),
            None => config_dir,
        };
        self.root = crate::utils::path::normalize_path(&root);
        if !self.root.is_dir() {
            return Err(ConfigError::Validation(format!(
                "theme root '{}' is not a directory",
                self.root.display()
            ))
            .into());
        }

        self.store.normalize();
        self.apply_cli(args);
        Ok(())
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    pub(crate) fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        eprintln!();
        log!("warning"; "unknown fields in {}:", display_path);
        log!("warning"; "ignoring:");
        for field in fields {
            eprintln!("- {}", field);
        }
        eprintln!();
    }

    /// Join a path with the root directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// Apply `dev` flags on top of the file values.
    pub fn apply_cli(&mut self, args: &DevArgs) {
        crate::logger::set_verbose(args.verbose);

        Self::update_option(&mut self.serve.interface, args.interface.as_ref());
        Self::update_option(&mut self.serve.port, args.port.as_ref());
        Self::update_option(&mut self.sync.interval_ms, args.poll_interval.as_ref());

        if args.no_delete {
            self.sync.no_delete = true;
        }
        if !args.only.is_empty() {
            self.sync.only = args.only.clone();
        }
        // CLI ignores apply to both directions
        self.sync.ignore.extend(args.ignore.iter().cloned());
        self.watch.ignore.extend(args.ignore.iter().cloned());
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Collect every validation error and return them at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        self.store.validate(&mut diag);
        self.sync.validate(&mut diag);
        self.watch.validate(&mut diag);

        if self.serve.ws_port() == self.serve.port {
            diag.error("serve.ws_port", "live reload port must differ from the preview port");
        }

        let mut handles = FxHashSet::default();
        let mut uuids = FxHashSet::default();
        for (idx, ext) in self.extensions.iter().enumerate() {
            ext.validate(idx, &mut diag);
            if !handles.insert(ext.handle.as_str()) {
                diag.error(
                    format!("extensions[{idx}].handle"),
                    format!("duplicate extension handle `{}`", ext.handle),
                );
            }
            if !uuids.insert(ext.uuid()) {
                diag.error(
                    format!("extensions[{idx}].uuid"),
                    format!("duplicate extension uuid `{}`", ext.uuid()),
                );
            }
        }

        diag.into_result()
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config content.
/// Panics if there are unknown fields (to catch config typos in tests).
#[cfg(test)]
pub fn test_parse_config(content: &str) -> DevConfig {
    let (parsed, ignored) = DevConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
