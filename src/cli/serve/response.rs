//! HTTP response handlers.

use anyhow::Result;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::asset::Asset;
use crate::proxy::{RenderError, RenderResponse};
use crate::utils::mime::types::{HTML, JSON, PLAIN};

/// Relay a renderer response.
///
/// Page renders are re-labelled as UTF-8 HTML unless the renderer answered
/// with JSON; passthrough responses keep their own content type.
pub fn respond_rendered(request: Request, rendered: RenderResponse, page: bool) -> Result<()> {
    let RenderResponse {
        status,
        content_type,
        headers,
        body,
    } = rendered;

    let content_type = relayed_content_type(content_type.as_deref(), page);

    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    for (name, value) in &headers {
        if let Some(header) = make_header(name, value) {
            response.add_header(header);
        }
    }
    if let Some(content_type) = content_type
        && let Some(header) = make_header("Content-Type", content_type)
    {
        response.add_header(header);
    }

    request.respond(response)?;
    Ok(())
}

fn relayed_content_type(upstream: Option<&str>, page: bool) -> Option<&str> {
    match upstream {
        Some(value) if !page || value.contains(JSON) => Some(value),
        _ if page => Some(HTML),
        _ => None,
    }
}

/// Serve a file from the local store.
pub fn respond_asset(request: Request, asset: &Asset) -> Result<()> {
    let content_type = crate::utils::mime::from_extension(asset.key.extension());
    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }
    send_body(request, 200, content_type, asset.content.as_bytes().to_vec())
}

/// Render failure page. Upstream failures keep the renderer's status.
pub fn respond_render_error(request: Request, error: &RenderError) -> Result<()> {
    let (status, detail) = match error {
        RenderError::Upstream { status, body } => (*status, body.clone()),
        RenderError::Transport { .. } => (502, crate::error::chain_message(error)),
        RenderError::Cancelled => (503, error.to_string()),
    };
    let body = format!(
        "<html><body><h1>Failed to render</h1><pre>{}</pre></body></html>",
        escape_html(&detail)
    );
    send_body(request, status, HTML, body.into_bytes())
}

/// Telemetry endpoints: nothing to say.
pub fn respond_no_content(request: Request) -> Result<()> {
    request.respond(Response::empty(StatusCode(204)))?;
    Ok(())
}

/// Respond with 503 Service Unavailable (session shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

pub fn respond_bad_request(request: Request, message: &str) -> Result<()> {
    send_body(request, 400, PLAIN, message.as_bytes().to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let mut response = Response::empty(StatusCode(status));
    if let Some(header) = make_header("Content-Type", content_type) {
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let mut response = Response::from_data(body).with_status_code(StatusCode(status));
    if let Some(header) = make_header("Content-Type", content_type) {
        response.add_header(header);
    }
    request.respond(response)?;
    Ok(())
}

/// Header from arbitrary text; relayed values tiny_http rejects are dropped.
fn make_header(key: &str, value: &str) -> Option<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes()).ok()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
