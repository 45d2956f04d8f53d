//! Project directory layout rules.
//!
//! Each top-level directory gates which file extensions may live in it.
//! Keys that break the rules are rejected before they reach the store.
//!
//! | Directory   | Theme            | Theme extension |
//! |-------------|------------------|-----------------|
//! | `assets`    | any              | any             |
//! | `blocks`    | liquid           | liquid          |
//! | `config`    | json             | -               |
//! | `layout`    | liquid           | -               |
//! | `locales`   | json             | json            |
//! | `sections`  | liquid, json     | -               |
//! | `snippets`  | liquid           | liquid          |
//! | `templates` | liquid, json     | -               |
//!
//! `Source` roots (UI extensions, functions) carry no directory rules.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{AssetError, FileKey};

/// Allowed extensions for one directory (`None` = anything goes).
type DirRule = (&'static str, Option<&'static [&'static str]>);

const LIQUID: &[&str] = &["liquid"];
const JSON: &[&str] = &["json"];
const LIQUID_OR_JSON: &[&str] = &["liquid", "json"];

const THEME_RULES: &[DirRule] = &[
    ("assets", None),
    ("blocks", Some(LIQUID)),
    ("config", Some(JSON)),
    ("layout", Some(LIQUID)),
    ("locales", Some(JSON)),
    ("sections", Some(LIQUID_OR_JSON)),
    ("snippets", Some(LIQUID)),
    ("templates", Some(LIQUID_OR_JSON)),
];

const EXTENSION_RULES: &[DirRule] = &[
    ("assets", None),
    ("blocks", Some(LIQUID)),
    ("locales", Some(JSON)),
    ("snippets", Some(LIQUID)),
];

/// Extensions stored as text; everything else is binary.
const TEXT_EXTENSIONS: &[&str] = &["liquid", "json", "js", "css", "scss", "sass", "svg", "txt"];

/// Which kind of project the root holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Theme,
    ThemeExtension,
    Source,
}

impl Layout {
    fn rules(self) -> &'static [DirRule] {
        match self {
            Self::Theme => THEME_RULES,
            Self::ThemeExtension => EXTENSION_RULES,
            Self::Source => &[],
        }
    }

    fn is_restricted(self) -> bool {
        !matches!(self, Self::Source)
    }

    /// Top-level directories that hold project files.
    pub fn directories(self) -> impl Iterator<Item = &'static str> {
        self.rules().iter().map(|(dir, _)| *dir)
    }

    /// Directory-level include globs (`assets/**/*`, ...).
    pub fn include_patterns(self) -> Vec<String> {
        self.directories().map(|dir| format!("{dir}/**/*")).collect()
    }

    /// Directories to walk and watch: the layout directories, or the root
    /// itself for unrestricted layouts.
    pub fn roots(self, root: &Path) -> Vec<PathBuf> {
        if self.is_restricted() {
            self.directories().map(|dir| root.join(dir)).collect()
        } else {
            vec![root.to_path_buf()]
        }
    }

    /// Check a key against the directory rules.
    pub fn validate(self, key: &FileKey) -> Result<(), AssetError> {
        if !self.is_restricted() {
            return Ok(());
        }
        let invalid = |reason: String| AssetError::Invalid {
            key: key.clone(),
            reason,
        };

        let Some(dir) = key.top_dir() else {
            return Err(invalid("files must live inside a project directory".into()));
        };
        let Some((_, allowed)) = self.rules().iter().find(|(name, _)| *name == dir) else {
            return Err(invalid(format!("`{dir}` is not a recognized directory")));
        };
        let Some(allowed) = allowed else {
            return Ok(());
        };

        match key.extension() {
            Some(ext) if allowed.contains(&ext) => Ok(()),
            _ => Err(invalid(format!(
                "only {} files are allowed in `{dir}/`",
                allowed.join(" or ")
            ))),
        }
    }

    /// Whether the key is stored as text.
    pub fn is_text_key(key: &FileKey) -> bool {
        key.extension()
            .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    }
}
