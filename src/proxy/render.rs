//! Pure request / response shaping for the remote renderer.

use std::sync::Arc;

use regex::Regex;
use url::Url;

use super::RenderTarget;
use crate::asset::{Asset, FileKey};

/// Query pairs every render carries, before anything from the client.
const RENDER_DEFAULTS: &[(&str, &str)] = &[("_fd", "0"), ("pb", "0")];

/// Meaningful for a single transport-level connection only.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "expect",
    "content-security-policy",
    "host",
];

/// Request headers rebuilt by the proxy itself.
const REWRITTEN_REQUEST: &[&str] = &[
    "cookie",
    "content-length",
    "content-type",
    "authorization",
    "upgrade-insecure-requests",
];

/// Response headers that no longer describe the relayed body.
const STRIPPED_RESPONSE: &[&str] = &["content-type", "content-length", "content-encoding"];

fn listed(list: &[&str], name: &str) -> bool {
    list.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Render URL: defaults first, then the target, then the client query.
///
/// `section_id` wins when both a section and an app block are requested.
pub fn render_url(
    origin: &str,
    path: &str,
    query: &[(String, String)],
    target: &RenderTarget,
) -> Result<Url, url::ParseError> {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    let mut url = Url::parse(&format!("{}{}", origin.trim_end_matches('/'), path))?;

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (name, value) in RENDER_DEFAULTS {
            pairs.append_pair(name, value);
        }
        if let Some(section) = target.section_id.as_deref().filter(|s| !s.is_empty()) {
            pairs.append_pair("section_id", section);
        } else if let Some(block) = target.app_block_id.as_deref().filter(|s| !s.is_empty()) {
            pairs.append_pair("app_block_id", block);
        }
        for (name, value) in query {
            let reserved = RENDER_DEFAULTS.iter().any(|(n, _)| n == name)
                || name == "section_id"
                || name == "app_block_id";
            if !reserved {
                pairs.append_pair(name, value);
            }
        }
    }

    Ok(url)
}

/// Form body: `_method=GET` plus one `replace_templates[key]` per text
/// override that can affect `path`.
///
/// `assets/` files are served locally and never replace anything. Template
/// overrides are narrowed to the template `path` renders when one of them
/// matches; otherwise all of them go along.
pub fn override_form(overrides: &[Arc<Asset>], path: &str) -> Vec<(String, String)> {
    let candidates: Vec<&Arc<Asset>> = overrides
        .iter()
        .filter(|asset| asset.key.top_dir() != Some("assets"))
        .collect();

    let route = route_template(path);
    let route_matched = candidates
        .iter()
        .any(|asset| template_name(&asset.key) == Some(route));

    let mut form = vec![("_method".to_string(), "GET".to_string())];
    form.extend(candidates.into_iter().filter_map(|asset| {
        if route_matched && template_name(&asset.key).is_some_and(|name| name != route) {
            return None;
        }
        let text = asset.content.as_text()?;
        Some((format!("replace_templates[{}]", asset.key), text.to_string()))
    }));
    form
}

/// Template a storefront route renders (`/products/x` -> `product`).
fn route_template(path: &str) -> &str {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next(), segments.next()) {
        (None | Some("index.html"), _, _) => "index",
        (Some("products"), _, _) => "product",
        (Some("collections"), None, _) => "list-collections",
        (Some("collections"), Some(_), _) => "collection",
        (Some("pages"), _, _) => "page",
        (Some("blogs"), _, Some(_)) => "article",
        (Some("blogs"), _, None) => "blog",
        (Some(first), _, _) => first.trim_end_matches(".html"),
    }
}

/// `index` for `templates/index.json` and alternates like `templates/index.sale.json`.
fn template_name(key: &FileKey) -> Option<&str> {
    let rest = key.as_str().strip_prefix("templates/")?;
    if rest.contains('/') {
        return None;
    }
    rest.split('.').next()
}

/// Client headers that may travel to the renderer.
pub fn forward_headers<'a>(
    headers: &'a [(String, String)],
    allow: impl Fn(&str) -> bool + 'a,
) -> impl Iterator<Item = &'a (String, String)> + 'a {
    headers.iter().filter(move |(name, _)| {
        !listed(HOP_BY_HOP, name) && !listed(REWRITTEN_REQUEST, name) && allow(name)
    })
}

/// First `Cookie` header of a client request.
pub fn client_cookie(headers: &[(String, String)]) -> Option<&str> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("cookie"))
        .map(|(_, value)| value.as_str())
}

/// Response headers relayed to the browser.
///
/// `Set-Cookie` domains pointing at the store are dropped so cookies stick
/// to localhost.
pub fn relay_headers<'a>(
    headers: impl IntoIterator<Item = (&'a str, &'a str)>,
    store_fqdn: &str,
) -> Vec<(String, String)> {
    let domain = Regex::new(&format!(r"(?i-u)Domain={};[ \t]*", regex::escape(store_fqdn))).ok();

    headers
        .into_iter()
        .filter(|(name, _)| !listed(HOP_BY_HOP, name) && !listed(STRIPPED_RESPONSE, name))
        .map(|(name, value)| {
            let value = match &domain {
                Some(re) if name.eq_ignore_ascii_case("set-cookie") => {
                    re.replace_all(value, "").into_owned()
                }
                _ => value.to_string(),
            };
            (name.to_string(), value)
        })
        .collect()
}

/// Latest value of a cookie set by the relayed `Set-Cookie` headers.
pub fn set_cookie_value(headers: &[(String, String)], cookie: &str) -> Option<String> {
    let re = Regex::new(&format!(r"(?:^|[, \t]){}=([^;,]*)", regex::escape(cookie))).ok()?;
    headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
        .filter_map(|(_, value)| re.captures(value)?.get(1).map(|m| m.as_str().to_string()))
        .next_back()
}
