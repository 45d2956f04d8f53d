use std::path::{Component, Path};

use glob::{Pattern, PatternError};

use crate::asset::{Layout, PathMatcher};
use crate::config::{DevConfig, ExtensionConfig};

/// Watch filter for the theme root: layout directories minus user and
/// built-in ignores.
pub(super) fn theme_matcher(config: &DevConfig) -> Result<PathMatcher, PatternError> {
    Ok(PathMatcher::new(Layout::Theme.include_patterns(), &config.watch.ignore)?.with_default_ignores())
}

/// Watch filter for one extension directory.
///
/// The build output is never watched, otherwise every build would trigger
/// the next one.
pub(super) fn extension_matcher(
    ext: &ExtensionConfig,
    config: &DevConfig,
) -> Result<PathMatcher, PatternError> {
    let mut ignore = config.watch.ignore.clone();
    if let Some(output) = ext.output.as_deref().and_then(output_ignore) {
        ignore.push(output);
    }
    Ok(PathMatcher::new(ext.kind.layout().include_patterns(), &ignore)?.with_default_ignores())
}

/// Anchored pattern covering the build output: its top directory when
/// nested, the file itself otherwise.
fn output_ignore(output: &Path) -> Option<String> {
    let mut parts = output.components().filter_map(|c| match c {
        Component::Normal(part) => part.to_str(),
        _ => None,
    });
    let first = parts.next()?;
    let escaped = Pattern::escape(first);
    if parts.next().is_some() {
        Some(format!("/{escaped}/**"))
    } else {
        Some(format!("/{escaped}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::FileKey;
    use crate::config::test_parse_config;

    const CONFIG: &str = r#"
[store]
domain = "shop.myshopify.com"
theme_id = 1

[watch]
ignore = ["*.tmp"]

[[extensions]]
handle = "checkout-ui"
type = "ui_extension"
registration_id = "42"
build_command = "npm run build"
output = "dist/main.js"
"#;

    #[test]
    fn test_theme_matcher() {
        let config = test_parse_config(CONFIG);
        let matcher = theme_matcher(&config).unwrap();
        assert!(matcher.is_match(&FileKey::new("sections/header.liquid")));
        assert!(!matcher.is_match(&FileKey::new("sections/header.tmp")));
        assert!(!matcher.is_match(&FileKey::new("README.md")));
    }

    #[test]
    fn test_extension_matcher_skips_build_output() {
        let config = test_parse_config(CONFIG);
        let matcher = extension_matcher(&config.extensions[0], &config).unwrap();
        assert!(matcher.is_match(&FileKey::new("src/index.ts")));
        assert!(!matcher.is_match(&FileKey::new("dist/main.js")));
        assert!(!matcher.is_match(&FileKey::new("dist/chunk.js")));
    }

    #[test]
    fn test_output_ignore() {
        assert_eq!(output_ignore(Path::new("dist/main.js")).as_deref(), Some("/dist/**"));
        assert_eq!(output_ignore(Path::new("bundle.js")).as_deref(), Some("/bundle.js"));
        assert_eq!(output_ignore(Path::new("")), None);
    }
}
