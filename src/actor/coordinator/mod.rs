//! Actor Coordinator - wires up one dev session
//!
//! The Coordinator is a thin orchestrator that:
//! - Mounts the theme and every extension into their stores
//! - Creates communication channels
//! - Wires up actors and the preview server
//! - Runs them until Ctrl+C or a fatal error
//!
//! ```text
//! FsActor(theme) ───────────────────────────┐
//! FsActor(ext) ──> DraftActor(ext) ─────────┼──> WsActor ──> browsers
//! SyncActor ──(remote changes)──────────────┘
//! preview server ──> RenderProxy ──> renderer
//! ```

mod runtime;
mod watch_paths;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use super::draft::{
    CommandBuilder, DraftActor, ExtensionBuilder, HttpDraftClient, PushSession, RetryPolicy,
    StoreBundler,
};
use super::fs::{FsActor, Listener, WatchOptions};
use super::messages::{DraftMsg, WsMsg};
use super::sync::SyncActor;
use super::ws::WsActor;
use crate::asset::{AssetStore, Layout, MountReport, mount};
use crate::cli::serve::{PreviewContext, bind_server};
use crate::config::{DevConfig, ExtensionConfig};
use crate::core::{Shutdown, register_session};
use crate::proxy::{RenderProxy, StorefrontSession};
use crate::reload::PayloadStore;
use crate::sync::{HttpThemeStore, ReconciliationEngine, ThemeTarget};
use runtime::ActorSet;

const CHANNEL_BUFFER: usize = 32;

/// Default draft endpoint timeout.
const DRAFT_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordinator - wires up and runs the actor system.
pub struct Coordinator {
    config: Arc<DevConfig>,
    shutdown: Shutdown,
}

impl Coordinator {
    pub fn with_config(config: Arc<DevConfig>) -> Self {
        Self {
            config,
            shutdown: Shutdown::new(),
        }
    }

    /// Run the session until Ctrl+C or the first fatal error.
    pub async fn run(self) -> Result<()> {
        let Self { config, shutdown } = self;
        register_session(shutdown.clone(), None);

        let token = config.auth.token()?;
        let (ws_tx, ws_rx) = mpsc::channel::<WsMsg>(CHANNEL_BUFFER);
        let mut actors = ActorSet::new();

        // Theme: watcher first, then mount, so nothing written in between is lost
        let theme = Arc::new(AssetStore::new(&config.root, Layout::Theme));
        let theme_matcher = watch_paths::theme_matcher(&config)?;
        let theme_watcher = FsActor::new(
            Arc::clone(&theme),
            WatchOptions {
                matcher: theme_matcher.clone(),
                stability: config.watch.stability(),
            },
            vec![Listener::Preview(ws_tx.clone())],
            shutdown.clone(),
        )
        .context("failed to watch the theme root")?;
        report_mount("theme", &mount(&theme, &theme_matcher));
        actors.spawn(async move {
            theme_watcher.run().await;
            Ok(())
        });

        // Extensions: one watcher and one push loop each
        let mut extension_payloads = Vec::with_capacity(config.extensions.len());
        for ext in &config.extensions {
            let (watcher, draft) = spawn_extension(ext, &config, &token, &ws_tx, &shutdown)?;
            actors.spawn(async move {
                watcher.run().await;
                Ok(())
            });
            actors.spawn(draft.run());
            extension_payloads.push(ext.payload());
        }

        // Remote -> local polling
        let remote = HttpThemeStore::new(
            ThemeTarget {
                store: config.store.domain.clone(),
                theme_id: config.store.theme_id,
                api_version: config.store.api_version.clone(),
                access_token: token.clone(),
            },
            config.sync.timeout(),
        )?;
        let engine = Arc::new(ReconciliationEngine::new(
            Arc::clone(&theme),
            Arc::new(remote),
            config.sync.reconcile_options()?,
        ));
        let sync = SyncActor::new(engine, config.sync.interval(), ws_tx.clone(), shutdown.clone());
        actors.spawn(sync.run());

        // Live reload
        let payload = PayloadStore::new(
            config.app.payload(&config.store.domain),
            config.store.domain.clone(),
            extension_payloads,
        );
        let ws_port = crate::reload::server::start_ws_server(
            &config.serve.interface.to_string(),
            config.serve.ws_port(),
            ws_tx.clone(),
            shutdown.clone(),
        )?;
        crate::log!("reload"; "ws://{}:{}", config.serve.interface, ws_port);
        let ws = WsActor::new(ws_rx, ws_tx, payload, shutdown.clone())
            .with_theme_store(Arc::clone(&theme));
        actors.spawn(async move {
            ws.run().await;
            Ok(())
        });

        // Preview server
        let session = StorefrontSession {
            store_fqdn: config.store.domain.clone(),
            token,
            storefront_token: config.auth.storefront_token().unwrap_or_default(),
            session_cookies: Vec::new(),
        };
        let proxy = RenderProxy::new(
            session,
            Arc::clone(&theme),
            Duration::from_millis(config.serve.render_timeout_ms),
        )?;
        let server = bind_server(&config)?;
        register_session(shutdown.clone(), Some(server.server()));
        let ctx = PreviewContext {
            proxy: Arc::new(proxy),
            store: theme,
            runtime: tokio::runtime::Handle::current(),
            shutdown: shutdown.clone(),
        };
        let server_task = tokio::task::spawn_blocking(move || server.run(ctx));

        crate::debug!("actor"; "start");
        let outcome = runtime::run_actors(actors, &shutdown).await;
        shutdown.trigger();
        let _ = server_task.await;
        crate::debug!("actor"; "stopped");

        outcome.map_err(Into::into)
    }
}

/// Mount one extension and build its watcher and push loop.
fn spawn_extension(
    ext: &ExtensionConfig,
    config: &DevConfig,
    token: &str,
    ws_tx: &mpsc::Sender<WsMsg>,
    shutdown: &Shutdown,
) -> Result<(FsActor, DraftActor)> {
    let dir = ext.directory(&config.root);
    let store = Arc::new(AssetStore::new(&dir, ext.kind.layout()));
    let matcher = watch_paths::extension_matcher(ext, config)?;

    let (draft_tx, draft_rx) = mpsc::channel::<DraftMsg>(CHANNEL_BUFFER);
    let watcher = FsActor::new(
        Arc::clone(&store),
        WatchOptions {
            matcher: matcher.clone(),
            stability: config.watch.stability(),
        },
        vec![Listener::Draft(draft_tx)],
        shutdown.clone(),
    )
    .with_context(|| format!("failed to watch extension '{}'", ext.handle))?;
    report_mount(&ext.handle, &mount(&store, &matcher));

    let builder: Arc<dyn ExtensionBuilder> = if ext.kind.needs_build_output() {
        Arc::new(CommandBuilder {
            command: ext.build_command.clone(),
            dir: dir.clone(),
            output: ext.output.clone().unwrap_or_default(),
            size_limit: ext.size_limit,
        })
    } else {
        Arc::new(StoreBundler {
            store,
            size_limit: ext.size_limit,
        })
    };

    let api_key = config.app.api_key.clone().unwrap_or_default();
    let client = HttpDraftClient::new(
        config.app.draft_url(&config.store.domain, &config.store.api_version),
        api_key,
        ext.draft_config(),
        config.app.draft_timeout_ms.map_or(DRAFT_TIMEOUT, Duration::from_millis),
    )?;
    let policy = RetryPolicy::new(Arc::new(client), Arc::new(config.auth.token_source()));

    let session = PushSession {
        extension_id: ext.uuid().to_string(),
        registration_id: ext.registration_id.clone(),
        current_token: token.to_string(),
    };
    let draft = DraftActor::new(
        draft_rx,
        ws_tx.clone(),
        ext.handle.clone(),
        ext.uuid(),
        session,
        builder,
        policy,
        shutdown.clone(),
    );
    Ok((watcher, draft))
}

fn report_mount(name: &str, report: &MountReport) {
    crate::log!("watch"; "{}: {} files", name, report.loaded);
    for rejected in &report.rejected {
        crate::log!("warning"; "{}: {}", name, crate::error::chain_message(rejected));
    }
}
