//! `[[extensions]]` configuration.
//!
//! ```toml
//! [[extensions]]
//! handle = "checkout-banner"
//! type = "ui_extension"
//! registration_id = "gid://extension/42"
//! build_command = "npm run build"
//! output = "dist/main.js"
//! targets = ["purchase.checkout.block.render"]
//!
//! [[extensions]]
//! handle = "reviews-theme"
//! type = "theme_app_extension"
//! registration_id = "gid://extension/43"
//! ```
//!
//! `type` selects the kind. Known kinds get typed fields; anything else is
//! kept verbatim in [`ExtensionKind::Unknown`] and forwarded with the draft.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value, json};

use crate::asset::Layout;
use crate::config::ConfigDiagnostics;

/// One extension developed in this session.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionConfig {
    pub handle: String,
    /// Payload id; defaults to the handle
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Default: `extensions/<handle>`
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub registration_id: String,
    #[serde(default)]
    pub build_command: Option<String>,
    /// Bundle written by `build_command`, relative to the directory
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Upper bound for the pushed artifact, in bytes
    #[serde(default)]
    pub size_limit: Option<u64>,
    #[serde(flatten)]
    pub kind: ExtensionKind,
}

/// Extension kind with its kind-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionKind {
    ThemeApp,
    Ui { targets: Vec<String> },
    Function { api: Option<String> },
    /// Kind this tool has no model for; fields pass through untouched
    Unknown {
        type_name: String,
        fields: Map<String, Value>,
    },
}

impl<'de> Deserialize<'de> for ExtensionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let type_name = match fields.remove("type") {
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(serde::de::Error::custom(format!(
                    "extension `type` must be a string, found {other}"
                )));
            }
            None => return Err(serde::de::Error::missing_field("type")),
        };

        Ok(match type_name.as_str() {
            "theme_app_extension" | "theme" => Self::ThemeApp,
            "ui_extension" => Self::Ui {
                targets: string_list(fields.get("targets")).map_err(serde::de::Error::custom)?,
            },
            "function" => Self::Function {
                api: fields.get("api").and_then(Value::as_str).map(str::to_string),
            },
            _ => Self::Unknown { type_name, fields },
        })
    }
}

fn string_list(value: Option<&Value>) -> Result<Vec<String>, String> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let Some(items) = value.as_array() else {
        return Err("`targets` must be a list of strings".into());
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| format!("target {item} is not a string"))
        })
        .collect()
}

impl ExtensionKind {
    pub fn type_name(&self) -> &str {
        match self {
            Self::ThemeApp => "theme_app_extension",
            Self::Ui { .. } => "ui_extension",
            Self::Function { .. } => "function",
            Self::Unknown { type_name, .. } => type_name,
        }
    }

    /// Directory rules for the extension's files.
    pub fn layout(&self) -> Layout {
        match self {
            Self::ThemeApp => Layout::ThemeExtension,
            _ => Layout::Source,
        }
    }

    /// Theme app extensions are pushed as their files; every other kind
    /// as the output of a build.
    pub fn needs_build_output(&self) -> bool {
        !matches!(self, Self::ThemeApp)
    }
}

impl ExtensionConfig {
    pub fn uuid(&self) -> &str {
        self.uuid.as_deref().unwrap_or(&self.handle)
    }

    pub fn directory(&self, root: &Path) -> PathBuf {
        match &self.directory {
            Some(dir) => root.join(dir),
            None => root.join("extensions").join(&self.handle),
        }
    }

    /// Kind-specific config sent along with every draft.
    pub fn draft_config(&self) -> Value {
        match &self.kind {
            ExtensionKind::ThemeApp => json!({}),
            ExtensionKind::Ui { targets } => json!({"targets": targets}),
            ExtensionKind::Function { api } => json!({"api": api}),
            ExtensionKind::Unknown { fields, .. } => Value::Object(fields.clone()),
        }
    }

    /// Initial entry in the preview payload.
    pub fn payload(&self) -> Value {
        let extension_points: Vec<Value> = match &self.kind {
            ExtensionKind::Ui { targets } => {
                targets.iter().map(|t| json!({"target": t})).collect()
            }
            _ => Vec::new(),
        };

        json!({
            "uuid": self.uuid(),
            "handle": self.handle,
            "type": self.kind.type_name(),
            "title": self.title.as_deref().unwrap_or(&self.handle),
            "development": {"status": "idle", "hidden": false},
            "extensionPoints": extension_points,
        })
    }

    pub(crate) fn validate(&self, idx: usize, diag: &mut ConfigDiagnostics) {
        let field = |name: &str| format!("extensions[{idx}].{name}");

        if self.handle.trim().is_empty() {
            diag.error(field("handle"), "extension handle is required");
        }
        if self.registration_id.trim().is_empty() {
            diag.error(field("registration_id"), "registration id is required to push drafts");
        }
        if self.kind.needs_build_output() && self.output.is_none() {
            diag.error_with_hint(
                field("output"),
                format!("`{}` extensions are pushed as a build output", self.kind.type_name()),
                "set `output` to the bundle written by `build_command`",
            );
        }
        if self.size_limit == Some(0) {
            diag.error(field("size_limit"), "size limit must be greater than zero");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_extension_kinds() {
        let config = test_parse_config(
            r#"
[[extensions]]
handle = "banner"
type = "ui_extension"
registration_id = "1"
output = "dist/main.js"
targets = ["purchase.checkout.block.render"]

[[extensions]]
handle = "reviews"
type = "theme_app_extension"
registration_id = "2"

[[extensions]]
handle = "discount"
type = "function"
registration_id = "3"
output = "dist/index.wasm"
api = "discounts"
"#,
        );

        let kinds: Vec<_> = config.extensions.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                ExtensionKind::Ui {
                    targets: vec!["purchase.checkout.block.render".into()]
                },
                ExtensionKind::ThemeApp,
                ExtensionKind::Function {
                    api: Some("discounts".into())
                },
            ]
        );
        assert_eq!(config.extensions[1].kind.layout(), Layout::ThemeExtension);
        assert_eq!(config.extensions[0].kind.layout(), Layout::Source);
    }

    #[test]
    fn test_unknown_kind_passes_fields_through() {
        let config = test_parse_config(
            r#"
[[extensions]]
handle = "pos"
type = "pos_ui_extension"
registration_id = "9"
output = "dist/pos.js"
tile = { title = "Loyalty", icon = "star" }
"#,
        );

        let ext = &config.extensions[0];
        let ExtensionKind::Unknown { type_name, fields } = &ext.kind else {
            panic!("expected unknown kind, got {:?}", ext.kind);
        };
        assert_eq!(type_name, "pos_ui_extension");
        assert_eq!(fields["tile"]["title"], "Loyalty");
        assert_eq!(ext.draft_config()["tile"]["icon"], "star");
        assert_eq!(ext.payload()["type"], "pos_ui_extension");
    }

    #[test]
    fn test_missing_type_rejected() {
        let content = "[[extensions]]\nhandle = \"x\"\n";
        assert!(crate::config::DevConfig::parse_with_ignored(content).is_err());
    }

    #[test]
    fn test_payload_and_defaults() {
        let config = test_parse_config(
            "[[extensions]]\nhandle = \"banner\"\ntype = \"ui_extension\"\ntargets = [\"a.render\"]",
        );
        let ext = &config.extensions[0];

        assert_eq!(ext.uuid(), "banner");
        assert_eq!(
            ext.directory(Path::new("/app")),
            PathBuf::from("/app/extensions/banner")
        );

        let payload = ext.payload();
        assert_eq!(payload["development"]["status"], "idle");
        assert_eq!(payload["extensionPoints"][0]["target"], "a.render");
        assert_eq!(payload["title"], "banner");
    }

    #[test]
    fn test_validation_names_fields() {
        let config = test_parse_config(
            "[[extensions]]\nhandle = \"banner\"\ntype = \"ui_extension\"\nsize_limit = 0",
        );
        let mut diag = ConfigDiagnostics::new();
        config.extensions[0].validate(0, &mut diag);

        let fields: Vec<_> = diag.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "extensions[0].registration_id",
                "extensions[0].output",
                "extensions[0].size_limit",
            ]
        );
    }
}
