//! Storefront credentials and the headers they imply.

use rustc_hash::FxHashMap;

/// Theme-access passwords carry this prefix.
const THEME_ACCESS_PREFIX: &str = "shptka_";

/// Delegated renderer for theme-access sessions.
const THEME_ACCESS_HOST: &str = "https://theme-kit-access.shopifyapps.com/cli/sfr";

/// Request headers forwarded in theme-access sessions; everything else stays
/// local.
const THEME_ACCESS_FORWARD: &[&str] = &[
    "accept",
    "accept-language",
    "user-agent",
];

/// Renderer session cookie, refreshed from every response that sets it.
pub const SESSION_COOKIE: &str = "_shopify_essential";

/// Which credential the session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Storefront API token, rendered directly by the store
    Storefront,
    /// Delegated theme-access password
    ThemeAccess,
}

/// Credentials for the remote renderer.
#[derive(Debug, Clone, Default)]
pub struct StorefrontSession {
    /// `shop.myshopify.com`
    pub store_fqdn: String,
    /// Admin or theme-access token
    pub token: String,
    pub storefront_token: String,
    /// Cookies obtained when the session was opened, sent with every render
    pub session_cookies: Vec<(String, String)>,
}

impl StorefrontSession {
    pub fn kind(&self) -> SessionKind {
        if self.token.starts_with(THEME_ACCESS_PREFIX) {
            SessionKind::ThemeAccess
        } else {
            SessionKind::Storefront
        }
    }

    /// Origin that renders for this session, without trailing slash.
    pub fn origin(&self) -> String {
        match self.kind() {
            SessionKind::Storefront => format!("https://{}", self.store_fqdn),
            SessionKind::ThemeAccess => THEME_ACCESS_HOST.to_string(),
        }
    }

    /// Authentication headers. A pure function of the credential.
    pub fn auth_headers(&self) -> Vec<(&'static str, String)> {
        match self.kind() {
            SessionKind::Storefront => {
                vec![("Authorization", format!("Bearer {}", self.storefront_token))]
            }
            SessionKind::ThemeAccess => vec![
                ("X-Shopify-Shop", self.store_fqdn.clone()),
                ("X-Shopify-Access-Token", self.token.clone()),
            ],
        }
    }

    /// Whether a client request header may be forwarded.
    pub fn forwards(&self, name: &str) -> bool {
        match self.kind() {
            SessionKind::Storefront => true,
            SessionKind::ThemeAccess => THEME_ACCESS_FORWARD
                .iter()
                .any(|h| h.eq_ignore_ascii_case(name)),
        }
    }

    /// Copy of the session with one session cookie set or replaced.
    pub fn with_session_cookie(&self, name: &str, value: &str) -> Self {
        let mut next = self.clone();
        match next.session_cookies.iter_mut().find(|(n, _)| n == name) {
            Some((_, current)) => *current = value.to_string(),
            None => next
                .session_cookies
                .push((name.to_string(), value.to_string())),
        }
        next
    }

    /// Client cookies merged with the session cookies; session values win.
    ///
    /// Only the first `Cookie` header of the client request is used.
    pub fn merge_cookies(&self, client_cookie: Option<&str>) -> String {
        let mut order: Vec<String> = Vec::new();
        let mut values: FxHashMap<String, String> = FxHashMap::default();

        let client = client_cookie
            .unwrap_or_default()
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            });
        let session = self
            .session_cookies
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()));

        for (name, value) in client.chain(session) {
            if name.is_empty() {
                continue;
            }
            if values.insert(name.clone(), value).is_none() {
                order.push(name);
            }
        }

        order
            .iter()
            .filter_map(|name| values.get(name).map(|value| format!("{name}={value}")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(token: &str) -> StorefrontSession {
        StorefrontSession {
            store_fqdn: "store.myshopify.com".into(),
            token: token.into(),
            storefront_token: "token_111222333".into(),
            session_cookies: vec![
                ("storefront_digest".into(), "00001111222233334444".into()),
                ("_shopify_essential".into(), ":00112233445566778899:".into()),
            ],
        }
    }

    #[test]
    fn test_storefront_session_headers() {
        let s = session("admin_token_abc123");
        assert_eq!(s.kind(), SessionKind::Storefront);
        assert_eq!(s.origin(), "https://store.myshopify.com");
        assert_eq!(
            s.auth_headers(),
            vec![("Authorization", "Bearer token_111222333".to_string())]
        );
        assert!(s.forwards("X-Special-Header"));
    }

    #[test]
    fn test_theme_access_session_headers() {
        let s = session("shptka_abc123");
        assert_eq!(s.kind(), SessionKind::ThemeAccess);
        assert_eq!(s.origin(), "https://theme-kit-access.shopifyapps.com/cli/sfr");
        assert_eq!(
            s.auth_headers(),
            vec![
                ("X-Shopify-Shop", "store.myshopify.com".to_string()),
                ("X-Shopify-Access-Token", "shptka_abc123".to_string()),
            ]
        );
        assert!(s.forwards("Accept-Language"));
        assert!(!s.forwards("X-Special-Header"));
    }

    #[test]
    fn test_cookie_merge() {
        let s = session("admin_token_abc123");
        assert_eq!(
            s.merge_cookies(Some("theme_cookie=abc;")),
            "theme_cookie=abc; storefront_digest=00001111222233334444; _shopify_essential=:00112233445566778899:"
        );
    }

    #[test]
    fn test_session_cookie_overrides_client_value() {
        let s = session("admin_token_abc123");
        let merged = s.merge_cookies(Some("_shopify_essential=stale; a=1"));
        assert_eq!(
            merged,
            "_shopify_essential=:00112233445566778899:; a=1; storefront_digest=00001111222233334444"
        );
    }

    #[test]
    fn test_with_session_cookie_replaces_value() {
        let s = session("admin_token_abc123").with_session_cookie(SESSION_COOKIE, ":fresh:");
        assert_eq!(s.session_cookies.len(), 2);
        assert_eq!(s.session_cookies[1], (SESSION_COOKIE.to_string(), ":fresh:".to_string()));

        let added = StorefrontSession::default().with_session_cookie(SESSION_COOKIE, "x");
        assert_eq!(added.session_cookies, vec![(SESSION_COOKIE.to_string(), "x".to_string())]);
    }
}
