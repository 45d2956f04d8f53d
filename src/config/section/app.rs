//! `[app]` section configuration.
//!
//! ```toml
//! [app]
//! api_key = "0123456789abcdef"
//! title = "My App"
//! url = "https://example.com"     # default: store's app redirect URL
//! draft_url = "https://..."       # draft endpoint, default derived from the store
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub draft_url: Option<String>,
    pub draft_timeout_ms: Option<u64>,
}

impl AppConfig {
    /// App part of the preview payload.
    pub fn payload(&self, store: &str) -> Map<String, Value> {
        let api_key = self.api_key.clone().unwrap_or_default();
        let url = self.url.clone().unwrap_or_else(|| {
            format!("https://{store}/admin/oauth/redirect_from_cli?client_id={api_key}")
        });

        let mut map = Map::new();
        map.insert("apiKey".into(), Value::String(api_key));
        map.insert("title".into(), Value::String(self.title.clone()));
        map.insert("url".into(), Value::String(url));
        map
    }

    pub fn draft_url(&self, store: &str, api_version: &str) -> String {
        self.draft_url.clone().unwrap_or_else(|| {
            format!("https://{store}/admin/api/{api_version}/extensions/drafts.json")
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_app_payload_defaults_url_to_store_redirect() {
        let config = test_parse_config("[app]\napi_key = \"abc\"\ntitle = \"Reviews\"");
        let payload = config.app.payload("shop.myshopify.com");

        assert_eq!(payload["apiKey"], "abc");
        assert_eq!(payload["title"], "Reviews");
        assert_eq!(
            payload["url"],
            "https://shop.myshopify.com/admin/oauth/redirect_from_cli?client_id=abc"
        );
    }

    #[test]
    fn test_draft_url_override() {
        let config = test_parse_config("[app]\ndraft_url = \"http://127.0.0.1:4000/drafts\"");
        assert_eq!(
            config.app.draft_url("shop.myshopify.com", "2024-10"),
            "http://127.0.0.1:4000/drafts"
        );
    }
}
