use std::io::Read;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use tempfile::TempDir;
use tiny_http::{Header, Response, Server};

use super::*;
use crate::asset::{Asset, AssetContent, FileKey, Layout};

/// What the loopback renderer received.
#[derive(Debug)]
struct Captured {
    method: String,
    url: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .map(|(n, v)| (n.into_owned(), v.into_owned()))
            .collect()
    }
}

/// Serve one request with the given reply, report what arrived.
fn loopback(status: u16, body: &'static str) -> (String, mpsc::Receiver<Captured>) {
    loopback_with(status, body, &[])
}

fn loopback_with(
    status: u16,
    body: &'static str,
    extra: &'static [(&'static str, &'static str)],
) -> (String, mpsc::Receiver<Captured>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let Ok(mut request) = server.recv() else {
            return;
        };
        let mut content = String::new();
        let _ = request.as_reader().read_to_string(&mut content);
        let captured = Captured {
            method: request.method().to_string(),
            url: request.url().to_string(),
            headers: request
                .headers()
                .iter()
                .map(|h| (h.field.as_str().to_string(), h.value.to_string()))
                .collect(),
            body: content,
        };
        let mut response = Response::from_string(body)
            .with_status_code(status)
            .with_header(Header::from_bytes("Content-Type", "application/json").unwrap())
            .with_header(Header::from_bytes("something", "else").unwrap());
        for (name, value) in extra {
            response.add_header(Header::from_bytes(*name, *value).unwrap());
        }
        let _ = request.respond(response);
        let _ = tx.send(captured);
    });

    (format!("http://127.0.0.1:{port}"), rx)
}

fn session(token: &str) -> StorefrontSession {
    StorefrontSession {
        store_fqdn: "store.myshopify.com".into(),
        token: token.into(),
        storefront_token: "token_111222333".into(),
        session_cookies: vec![("storefront_digest".into(), "0000".into())],
    }
}

fn store_with_override() -> (TempDir, Arc<AssetStore>) {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(AssetStore::new(temp.path(), Layout::Theme));
    let key = FileKey::new("sections/header.liquid");
    store
        .insert(Asset::new(key.clone(), AssetContent::Text("<h1>local</h1>".into())))
        .unwrap();
    store.mark_override(&key);
    (temp, store)
}

fn request(url: &str) -> RenderRequest {
    RenderRequest::from_url(
        url,
        vec![
            ("X-Special-Header".into(), "200".into()),
            ("cookie".into(), "theme_cookie=abc;".into()),
        ],
    )
}

#[tokio::test]
async fn test_render_posts_overrides() {
    let (origin, rx) = loopback(200, "<html></html>");
    let (_temp, store) = store_with_override();
    let proxy = RenderProxy::new(session("admin_token"), store, Duration::from_secs(5))
        .unwrap()
        .with_origin(origin);

    let response = proxy.render(&request("/products/1")).await.unwrap();
    let captured = rx.recv_timeout(Duration::from_secs(2)).unwrap();

    assert_eq!(captured.method, "POST");
    assert_eq!(captured.url, "/products/1?_fd=0&pb=0");
    assert_eq!(captured.header("Authorization"), Some("Bearer token_111222333"));
    assert_eq!(captured.header("X-Special-Header"), Some("200"));
    assert_eq!(
        captured.header("Cookie"),
        Some("theme_cookie=abc; storefront_digest=0000")
    );
    assert_eq!(
        captured.form(),
        vec![
            ("_method".to_string(), "GET".to_string()),
            (
                "replace_templates[sections/header.liquid]".to_string(),
                "<h1>local</h1>".to_string()
            ),
        ]
    );

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<html></html>");
    assert!(
        !response
            .headers
            .iter()
            .any(|(n, _)| n.eq_ignore_ascii_case("content-type"))
    );
    assert!(response.headers.iter().any(|(n, v)| n == "something" && v == "else"));
}

#[tokio::test]
async fn test_theme_access_render() {
    let (origin, rx) = loopback(200, "ok");
    let (_temp, store) = store_with_override();
    let proxy = RenderProxy::new(session("shptka_abc123"), store, Duration::from_secs(5))
        .unwrap()
        .with_origin(origin);

    proxy
        .render(&request("/?section_id=header&app_block_id=b1"))
        .await
        .unwrap();
    let captured = rx.recv_timeout(Duration::from_secs(2)).unwrap();

    assert_eq!(captured.url, "/?_fd=0&pb=0&section_id=header");
    assert_eq!(captured.header("X-Shopify-Shop"), Some("store.myshopify.com"));
    assert_eq!(captured.header("X-Shopify-Access-Token"), Some("shptka_abc123"));
    assert_eq!(captured.header("Authorization"), None);
    assert_eq!(captured.header("X-Special-Header"), None);
}

#[tokio::test]
async fn test_upstream_error_surfaces_status_and_body() {
    let (origin, _rx) = loopback(500, "boom");
    let (_temp, store) = store_with_override();
    let proxy = RenderProxy::new(session("admin_token"), store, Duration::from_secs(5))
        .unwrap()
        .with_origin(origin);

    let err = proxy.render(&request("/")).await.unwrap_err();
    match err {
        RenderError::Upstream { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_error_names_url() {
    // Bind and release a port so nothing listens on it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let (_temp, store) = store_with_override();
    let proxy = RenderProxy::new(session("admin_token"), store, Duration::from_secs(2))
        .unwrap()
        .with_origin(format!("http://127.0.0.1:{port}"));

    let err = proxy.render(&request("/collections/all")).await.unwrap_err();
    match err {
        RenderError::Transport { url, .. } => {
            assert!(url.contains("/collections/all?_fd=0&pb=0"), "{url}");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_render_cancelled_on_shutdown() {
    let (origin, _rx) = loopback(200, "late");
    let (_temp, store) = store_with_override();
    let proxy = RenderProxy::new(session("admin_token"), store, Duration::from_secs(5))
        .unwrap()
        .with_origin(origin);

    let shutdown = Shutdown::new();
    shutdown.trigger();
    let err = proxy
        .render_cancellable(&request("/"), &shutdown)
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::Cancelled));
}

#[test]
fn test_request_from_url() {
    let request = RenderRequest::from_url("/search?q=shoes&section_id=results", Vec::new());
    assert_eq!(request.path, "/search");
    assert_eq!(request.target.section_id.as_deref(), Some("results"));
    assert_eq!(request.target.app_block_id, None);
    assert_eq!(request.query.len(), 2);
}

#[tokio::test]
async fn test_session_cookie_refreshed_from_response() {
    let (origin, _rx) = loopback_with(
        200,
        "<html></html>",
        &[("Set-Cookie", "_shopify_essential=:fresh:; Domain=store.myshopify.com; Path=/")],
    );
    let (_temp, store) = store_with_override();
    let proxy = RenderProxy::new(session("admin_token"), store, Duration::from_secs(5))
        .unwrap()
        .with_origin(origin);

    let response = proxy.render(&request("/")).await.unwrap();

    let set_cookie = response
        .headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("set-cookie"))
        .map(|(_, v)| v.as_str());
    assert_eq!(set_cookie, Some("_shopify_essential=:fresh:; Path=/"));
    assert!(
        proxy
            .session()
            .session_cookies
            .contains(&(SESSION_COOKIE.to_string(), ":fresh:".to_string()))
    );
}

#[tokio::test]
async fn test_forward_relays_any_status_without_overrides() {
    let (origin, rx) = loopback(404, "missing");
    let (_temp, store) = store_with_override();
    let proxy = RenderProxy::new(session("admin_token"), store, Duration::from_secs(5))
        .unwrap()
        .with_origin(origin);

    let mut req = request("/cart/add.js");
    req.headers
        .push(("Content-Type".into(), "application/x-www-form-urlencoded".into()));
    let response = proxy
        .forward("POST", &req, b"id=1&quantity=2".to_vec())
        .await
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(response.body, b"missing");

    let captured = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(captured.method, "POST");
    assert_eq!(captured.url, "/cart/add.js?_fd=0&pb=0");
    assert_eq!(captured.body, "id=1&quantity=2");
    assert_eq!(
        captured.header("Content-Type"),
        Some("application/x-www-form-urlencoded")
    );
    assert_eq!(
        captured.header("Cookie"),
        Some("theme_cookie=abc; storefront_digest=0000")
    );
}
