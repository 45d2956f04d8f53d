//! Preview server.
//!
//! Local assets are served straight from the store, pages are rendered
//! remotely with every override attached, everything else is relayed.
//! Requests are handled on tokio's blocking pool so a slow render never
//! holds up the accept loop.

mod lifecycle;
mod response;
mod route;

use route::{Route, classify};

use crate::{
    asset::AssetStore,
    config::DevConfig,
    core::Shutdown,
    debug, log,
    proxy::{RenderProxy, RenderRequest},
};
use anyhow::Result;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tiny_http::{Request, Server};

/// How often the accept loop checks for shutdown.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Everything a request handler needs.
#[derive(Clone)]
pub struct PreviewContext {
    pub proxy: Arc<RenderProxy>,
    pub store: Arc<AssetStore>,
    pub runtime: tokio::runtime::Handle,
    pub shutdown: Shutdown,
}

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
}

/// Bind the preview server on the configured interface.
pub fn bind_server(config: &DevConfig) -> Result<BoundServer> {
    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    log!("serve"; "http://{}", addr);
    Ok(BoundServer {
        server: Arc::new(server),
        addr,
    })
}

impl BoundServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared handle, registered for Ctrl+C unblocking.
    pub fn server(&self) -> Arc<Server> {
        Arc::clone(&self.server)
    }

    /// Accept loop (blocking). Returns once the session shuts down.
    pub fn run(self, ctx: PreviewContext) {
        while !ctx.shutdown.is_triggered() {
            let request = match self.server.recv_timeout(ACCEPT_POLL) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    if !ctx.shutdown.is_triggered() {
                        log!("serve"; "accept failed: {e}");
                    }
                    break;
                }
            };

            let ctx = ctx.clone();
            ctx.runtime.clone().spawn_blocking(move || {
                if let Err(e) = handle_request(request, &ctx) {
                    debug!("serve"; "request error: {e}");
                }
            });
        }
    }
}

/// Handle a single HTTP request
fn handle_request(mut request: Request, ctx: &PreviewContext) -> Result<()> {
    if ctx.shutdown.is_triggered() || crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    let method = request.method().as_str().to_string();
    let url = request.url().to_string();
    let headers: Vec<(String, String)> = request
        .headers()
        .iter()
        .map(|h| (h.field.as_str().to_string(), h.value.as_str().to_string()))
        .collect();
    let accept = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("accept"))
        .map(|(_, value)| value.as_str());

    let route = classify(&method, &url, accept, &ctx.store);
    debug!("serve"; "{} {} -> {:?}", method, url, route);

    match route {
        Route::Ignored => response::respond_no_content(request),
        Route::Local(key) => match ctx.store.get(key.as_str()) {
            Some(asset) => response::respond_asset(request, &asset),
            // Deleted between classify and now
            None => forward(request, ctx, &method, &url, headers),
        },
        Route::Render => {
            let render = RenderRequest::from_url(&url, headers);
            let result = ctx
                .runtime
                .block_on(ctx.proxy.render_cancellable(&render, &ctx.shutdown));
            match result {
                Ok(rendered) => response::respond_rendered(request, rendered, true),
                Err(e) => {
                    log!("render"; "{} failed: {}", render.path, crate::error::chain_message(&e));
                    response::respond_render_error(request, &e)
                }
            }
        }
        Route::Forward => {
            let mut body = Vec::new();
            if let Err(e) = request.as_reader().read_to_end(&mut body) {
                return response::respond_bad_request(request, &format!("unreadable body: {e}"));
            }
            let forwarded = RenderRequest::from_url(&url, headers);
            match ctx.runtime.block_on(ctx.proxy.forward(&method, &forwarded, body)) {
                Ok(relayed) => response::respond_rendered(request, relayed, false),
                Err(e) => response::respond_render_error(request, &e),
            }
        }
    }
}

/// Relay a bodiless request that turned out not to be local.
fn forward(
    request: Request,
    ctx: &PreviewContext,
    method: &str,
    url: &str,
    headers: Vec<(String, String)>,
) -> Result<()> {
    let forwarded = RenderRequest::from_url(url, headers);
    match ctx.runtime.block_on(ctx.proxy.forward(method, &forwarded, Vec::new())) {
        Ok(relayed) => response::respond_rendered(request, relayed, false),
        Err(e) => response::respond_render_error(request, &e),
    }
}
