//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Reduce a store reference to its bare host.
///
/// Accepts a full URL or a host with an optional path; the result is
/// lowercased with scheme, path and port removed.
///
/// # Examples
/// ```ignore
/// normalize_store_domain("https://Shop.myshopify.com/admin") -> Some("shop.myshopify.com")
/// normalize_store_domain("shop.myshopify.com")               -> Some("shop.myshopify.com")
/// normalize_store_domain("")                                  -> None
/// ```
pub fn normalize_store_domain(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let parsed = url::Url::parse(&with_scheme).ok()?;
    parsed.host_str().map(str::to_ascii_lowercase)
}

/// Find config file by searching upward from current directory
///
/// Starts from cwd and walks up parent directories until finding `config_name`
/// Returns the absolute path to the config file if found
///
/// # Example
/// ```text
/// /home/user/theme/sections/      ← cwd
/// /home/user/theme/themedev.toml  ← found!
/// ```
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_from(&cwd, config_name)
}

fn find_config_from(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let mut current = start;
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None, // Reached filesystem root
        }
    }
}

// ============================================================================
// tests
// ============================================================================
