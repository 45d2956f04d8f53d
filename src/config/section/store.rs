//! `[store]` section configuration.
//!
//! ```toml
//! [store]
//! domain = "my-shop.myshopify.com"
//! theme_id = 123456789
//! api_version = "2024-10"
//! ```

use serde::Deserialize;

use crate::config::ConfigDiagnostics;
use crate::config::util::normalize_store_domain;

/// Remote store and development theme.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store domain; scheme and trailing slash are stripped on load.
    pub domain: String,
    pub theme_id: u64,
    pub api_version: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            theme_id: 0,
            api_version: "2024-10".into(),
        }
    }
}

impl StoreConfig {
    pub(crate) fn normalize(&mut self) {
        if let Some(domain) = normalize_store_domain(&self.domain) {
            self.domain = domain;
        }
    }

    pub(crate) fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.domain.is_empty() {
            diag.error_with_hint(
                "store.domain",
                "store domain is required",
                "set it to your store, e.g. `my-shop.myshopify.com`",
            );
        }
        if self.theme_id == 0 {
            diag.error("store.theme_id", "development theme id is required");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_store_domain_normalized() {
        let mut config =
            test_parse_config("[store]\ndomain = \"https://Shop.myshopify.com/\"\ntheme_id = 7");
        config.store.normalize();

        assert_eq!(config.store.domain, "shop.myshopify.com");
        assert_eq!(config.store.theme_id, 7);
        assert_eq!(config.store.api_version, "2024-10");
    }
}
