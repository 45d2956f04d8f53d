//! Render Proxy
//!
//! Forwards preview requests to the remote renderer with every local
//! override attached, and relays the response.
//!
//! ```text
//! browser --GET /products/1--> dev server --POST ?_fd=0&pb=0--> renderer
//!                                          replace_templates[...]
//! ```
//!
//! No retries: a failed render is reported to the browser as-is.

mod render;
mod session;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::asset::AssetStore;
use crate::core::Shutdown;

pub use session::{SESSION_COOKIE, SessionKind, StorefrontSession};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("renderer returned {status}")]
    Upstream { status: u16, body: String },

    #[error("render cancelled")]
    Cancelled,
}

/// Partial render selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderTarget {
    pub section_id: Option<String>,
    pub app_block_id: Option<String>,
}

/// A preview request as received by the dev server.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    /// Path without query, e.g. `/products/1`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub target: RenderTarget,
}

impl RenderRequest {
    /// Split a raw request URL (`/path?query`) and pull out the render target.
    pub fn from_url(url: &str, headers: Vec<(String, String)>) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let query: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .map(|(n, v)| (n.into_owned(), v.into_owned()))
            .collect();

        let find = |name: &str| {
            query
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
        };
        let target = RenderTarget {
            section_id: find("section_id"),
            app_block_id: find("app_block_id"),
        };

        Self {
            path: path.to_string(),
            query,
            headers,
            target,
        }
    }
}

/// Relayed renderer response.
#[derive(Debug, Clone)]
pub struct RenderResponse {
    pub status: u16,
    /// Upstream content type; not part of `headers`
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Render proxy bound to one store and one set of credentials.
///
/// The session is swapped atomically when the renderer hands out a fresh
/// session cookie, so concurrent renders never block on it.
pub struct RenderProxy {
    client: reqwest::Client,
    session: ArcSwap<StorefrontSession>,
    store: Arc<AssetStore>,
    origin: String,
}

impl RenderProxy {
    pub fn new(
        session: StorefrontSession,
        store: Arc<AssetStore>,
        timeout: Duration,
    ) -> Result<Self, RenderError> {
        let origin = session.origin();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            // 3xx goes back to the browser untouched
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| RenderError::Transport {
                url: origin.clone(),
                source: Box::new(e),
            })?;
        Ok(Self {
            client,
            session: ArcSwap::from_pointee(session),
            store,
            origin,
        })
    }

    /// Render against a different origin (local renderers, tests).
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn session(&self) -> Arc<StorefrontSession> {
        self.session.load_full()
    }

    /// Render one request.
    ///
    /// 2xx and 3xx responses are relayed; anything else surfaces as
    /// `Upstream` with the raw status and body.
    pub async fn render(&self, request: &RenderRequest) -> Result<RenderResponse, RenderError> {
        let url = render::render_url(&self.origin, &request.path, &request.query, &request.target)
            .map_err(|e| RenderError::Transport {
                url: format!("{}{}", self.origin, request.path),
                source: Box::new(e),
            })?;

        let overrides = self.store.overrides();
        let form = render::override_form(&overrides, &request.path);
        crate::debug!("render"; "{} ({} overrides)", request.path, form.len() - 1);

        let builder = self.client.post(url.clone()).form(&form);
        let response = self.send(builder, url.as_str(), &request.headers).await?;

        if !(200..400).contains(&response.status) {
            return Err(RenderError::Upstream {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(response)
    }

    /// Pass a non-page request (cart, scripts, CDN files) straight through.
    ///
    /// No overrides are attached and every status is relayed.
    pub async fn forward(
        &self,
        method: &str,
        request: &RenderRequest,
        body: Vec<u8>,
    ) -> Result<RenderResponse, RenderError> {
        let url = render::render_url(
            &self.origin,
            &request.path,
            &request.query,
            &RenderTarget::default(),
        )
        .map_err(|e| RenderError::Transport {
            url: format!("{}{}", self.origin, request.path),
            source: Box::new(e),
        })?;
        let method = reqwest::Method::from_bytes(method.as_bytes()).map_err(|e| {
            RenderError::Transport {
                url: url.to_string(),
                source: Box::new(e),
            }
        })?;

        let mut builder = self.client.request(method, url.clone());
        if !body.is_empty() {
            if let Some((_, content_type)) = request
                .headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            {
                builder = builder.header("Content-Type", content_type.as_str());
            }
            builder = builder.body(body);
        }
        self.send(builder, url.as_str(), &request.headers).await
    }

    /// Attach headers and credentials, send, relay the response.
    async fn send(
        &self,
        mut builder: reqwest::RequestBuilder,
        url: &str,
        client_headers: &[(String, String)],
    ) -> Result<RenderResponse, RenderError> {
        let transport = |e: reqwest::Error| RenderError::Transport {
            url: url.to_string(),
            source: Box::new(e),
        };
        let session = self.session.load_full();

        for (name, value) in render::forward_headers(client_headers, |name| session.forwards(name)) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (name, value) in session.auth_headers() {
            builder = builder.header(name, value);
        }
        let cookie = session.merge_cookies(render::client_cookie(client_headers));
        if !cookie.is_empty() {
            builder = builder.header("Cookie", cookie);
        }

        let response = builder.send().await.map_err(transport)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let headers = render::relay_headers(
            response
                .headers()
                .iter()
                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
            &session.store_fqdn,
        );
        let body = response.bytes().await.map_err(transport)?.to_vec();

        self.refresh_session(&headers);
        Ok(RenderResponse {
            status,
            content_type,
            headers,
            body,
        })
    }

    /// Keep the session cookie the renderer last handed out.
    fn refresh_session(&self, headers: &[(String, String)]) {
        let Some(value) = render::set_cookie_value(headers, SESSION_COOKIE) else {
            return;
        };
        self.session.rcu(|current| {
            let unchanged = current
                .session_cookies
                .iter()
                .any(|(name, v)| name == SESSION_COOKIE && *v == value);
            if unchanged {
                Arc::clone(current)
            } else {
                Arc::new(current.with_session_cookie(SESSION_COOKIE, &value))
            }
        });
    }

    /// Render, aborting as soon as the session shuts down.
    pub async fn render_cancellable(
        &self,
        request: &RenderRequest,
        shutdown: &Shutdown,
    ) -> Result<RenderResponse, RenderError> {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(RenderError::Cancelled),
            result = self.render(request) => result,
        }
    }
}
