//! Request routing for the preview server.
//!
//! | Path              | Accept header      | Route     |
//! |-------------------|--------------------|-----------|
//! | /wpm@..., ...     |                    | Ignored   |
//! | /assets/x.css     |                    | Local     |
//! | /cdn/...          |                    | Forward   |
//! | /cart/...         |                    | Forward   |
//! | /.../file.js      |                    | Forward   |
//! | /payments/config  | application/json   | Forward   |
//! | /search/suggest   | */*                | Render    |
//! | /products/1       | text/html          | Render    |

use std::sync::OnceLock;

use regex::Regex;

use crate::asset::{AssetStore, FileKey};

/// Telemetry and challenge endpoints answered locally with 204.
const IGNORED_ENDPOINTS: &[&str] = &[
    "/.well-known",
    "/shopify/monorail",
    "/mini-profiler-resources",
    "/web-pixels-manager",
    "/web-pixels@",
    "/wpm",
    "/services/",
    "/api/collect",
    "/cdn-cgi/challenge-platform",
];

/// Always proxied regardless of the accept header.
const FORWARD_PREFIXES: &[&str] = &["/cart/", "/cdn/", "/ext/cdn/"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// 204 without touching the network
    Ignored,
    /// Served from the local store
    Local(FileKey),
    /// Rendered with local overrides
    Render,
    /// Passed through to the storefront as-is
    Forward,
}

/// Decide how to answer one request.
pub fn classify(method: &str, url: &str, accept: Option<&str>, store: &AssetStore) -> Route {
    let path = url.split(['?', '#']).next().unwrap_or_default();

    if IGNORED_ENDPOINTS.iter().any(|p| path.starts_with(p)) {
        return Route::Ignored;
    }

    if method == "GET"
        && let Some(name) = path.strip_prefix("/assets/")
        && let Ok(decoded) = percent_encoding::percent_decode_str(name).decode_utf8()
    {
        let key = FileKey::new(format!("assets/{decoded}"));
        if store.contains(key.as_str()) {
            return Route::Local(key);
        }
    }

    if forwards(method, path, accept.unwrap_or("*/*")) {
        Route::Forward
    } else {
        Route::Render
    }
}

fn forwards(method: &str, path: &str, accept: &str) -> bool {
    if method != "GET" {
        return true;
    }
    if FORWARD_PREFIXES.iter().any(|p| path.starts_with(p))
        || is_checkout(path)
        || is_account(path)
    {
        return true;
    }

    let extension = path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext);
    if extension == Some("html") || accept.contains("text/html") {
        return false;
    }
    extension.is_some() || accept != "*/*"
}

fn is_checkout(path: &str) -> bool {
    path.starts_with("/checkouts/") && !path.starts_with("/checkouts/internal/")
}

fn is_account(path: &str) -> bool {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/account(/login/multipass(/[^/]+)?|/logout)?/?$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{Asset, AssetContent, Layout};

    fn store() -> (tempfile::TempDir, AssetStore) {
        let temp = tempfile::tempdir().unwrap();
        let store = AssetStore::new(temp.path(), Layout::Theme);
        store
            .insert(Asset::new(
                FileKey::new("assets/base.css"),
                AssetContent::Text("body{}".into()),
            ))
            .unwrap();
        (temp, store)
    }

    #[test]
    fn test_ignored_endpoints() {
        let (_temp, store) = store();
        for url in ["/wpm@abc/sandbox", "/.well-known/shopify", "/api/collect"] {
            assert_eq!(classify("POST", url, None, &store), Route::Ignored, "{url}");
        }
    }

    #[test]
    fn test_local_asset() {
        let (_temp, store) = store();
        assert_eq!(
            classify("GET", "/assets/base.css?v=1", Some("text/css"), &store),
            Route::Local(FileKey::new("assets/base.css"))
        );
        // Not local: proxied like any other file
        assert_eq!(
            classify("GET", "/assets/other.js", None, &store),
            Route::Forward
        );
    }

    #[test]
    fn test_page_requests_render() {
        let (_temp, store) = store();
        assert_eq!(
            classify("GET", "/products/1", Some("text/html,application/xhtml+xml"), &store),
            Route::Render
        );
        assert_eq!(classify("GET", "/search/suggest", Some("*/*"), &store), Route::Render);
        assert_eq!(classify("GET", "/pages/about.html", None, &store), Route::Render);
    }

    #[test]
    fn test_forwarded_requests() {
        let (_temp, store) = store();
        assert_eq!(classify("POST", "/products/1", None, &store), Route::Forward);
        assert_eq!(classify("GET", "/cart/add.js", Some("text/html"), &store), Route::Forward);
        assert_eq!(classify("GET", "/checkouts/cn/123", None, &store), Route::Forward);
        assert_eq!(classify("GET", "/checkouts/internal/x", Some("text/html"), &store), Route::Render);
        assert_eq!(classify("GET", "/account/logout", Some("text/html"), &store), Route::Forward);
        assert_eq!(
            classify("GET", "/payments/config", Some("application/json"), &store),
            Route::Forward
        );
    }
}
