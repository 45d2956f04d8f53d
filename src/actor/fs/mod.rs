//! FileSystem Actor
//!
//! Watches one project root and turns notify events into typed
//! `ChangeEvent`s (`add` / `change` / `unlink`) keyed by root-relative path.
//! Implements the "Watcher-First" pattern: the watcher is attached before
//! the initial mount, so nothing written during the mount is lost.
//!
//! Architecture:
//! ```text
//! Watcher → Debouncer (stability timing) → Classifier (store update) → Listeners
//! ```
//!
//! Add / change are released once the file's size and mtime held still for
//! the stability interval; unlink is released on the next tick. Before a
//! change is delivered the store already holds the new content.

use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::time::Instant;

use crate::asset::{AssetStore, PathMatcher};
use crate::core::Shutdown;

// Store-facing classification (settled paths -> ChangeEvent).
mod classifier;
// Per-path stability timing and deduplication.
mod debouncer;
// Event routing (ChangeEvent -> listener messages).
mod router;
// Shared fs event types.
mod types;
// Watch root attach/re-attach lifecycle.
mod watch_roots;


pub use debouncer::STABILITY_MS;
pub use router::Listener;

use classifier::{EventClassifier, files_under};
use debouncer::Debouncer;
use router::{log_events, route};
use types::ChangeKind;
use watch_roots::WatchRoots;

/// Filtering and timing for one watcher.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub matcher: PathMatcher,
    pub stability: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            matcher: PathMatcher::default().with_default_ignores(),
            stability: Duration::from_millis(STABILITY_MS),
        }
    }
}

/// FileSystem Actor - watches one store root for changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    /// Layout directories, attached as they appear
    watch_roots: WatchRoots,
    debouncer: Debouncer,
    store: Arc<AssetStore>,
    matcher: PathMatcher,
    listeners: Vec<Listener>,
    shutdown: Shutdown,
}

impl FsActor {
    /// Create a new FsActor with Watcher-First pattern
    ///
    /// The watcher starts immediately, buffering events while the caller
    /// mounts the initial tree into the store.
    #[rustfmt::skip]
    pub fn new(
        store: Arc<AssetStore>,
        options: WatchOptions,
        listeners: Vec<Listener>,
        shutdown: Shutdown,
    ) -> notify::Result<Self> {
        // Create sync channel for notify (it doesn't support async)
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        // Missing layout directories are attached later by `maintain`
        let mut watch_roots = WatchRoots::new(store.layout().roots(store.root()));
        watch_roots.attach_existing(&mut watcher)?;

        Ok(Self {
            notify_rx,
            watcher,
            watch_roots,
            debouncer: Debouncer::new(options.stability),
            store,
            matcher: options.matcher,
            listeners,
            shutdown,
        })
    }

    /// Run the actor event loop until shutdown or until every listener is gone.
    pub async fn run(self) {
        let Self {
            notify_rx,
            mut watcher,
            mut watch_roots,
            mut debouncer,
            store,
            matcher,
            mut listeners,
            shutdown,
        } = self;

        let (async_tx, async_rx) = tokio::sync::mpsc::channel::<notify::Event>(64);

        // Spawn a thread to poll notify events and send to async channel
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        let classifier = EventClassifier {
            store: &store,
            matcher: &matcher,
        };

        debounce_loop(
            async_rx,
            &mut debouncer,
            &classifier,
            &mut listeners,
            &shutdown,
            |debouncer| {
                for dir in watch_roots.maintain(&mut watcher) {
                    for file in files_under(&dir) {
                        debouncer.add_path(file, ChangeKind::Created);
                    }
                }
            },
        )
        .await;
        crate::debug!("watch"; "stopping watcher for {}", store.root().display());
    }
}

/// Feed raw events into the debouncer and release settled paths.
///
/// The release deadline is only ever pulled in by new events, so a path
/// rewritten faster than the stability interval cannot hold back the others.
/// `on_tick` runs before every release.
async fn debounce_loop(
    mut events: tokio::sync::mpsc::Receiver<notify::Event>,
    debouncer: &mut Debouncer,
    classifier: &EventClassifier<'_>,
    listeners: &mut Vec<Listener>,
    shutdown: &Shutdown,
    mut on_tick: impl FnMut(&mut Debouncer),
) {
    let tick = tokio::time::sleep(debouncer.sleep_duration());
    tokio::pin!(tick);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = &mut tick => {
                on_tick(debouncer);
                if process_changes(debouncer, classifier, listeners).await.is_err() {
                    break;
                }
                tick.as_mut().reset(Instant::now() + debouncer.sleep_duration());
            }
            Some(event) = events.recv() => {
                debouncer.add_event(&event);
                let next = Instant::now() + debouncer.sleep_duration();
                if next < tick.deadline() {
                    tick.as_mut().reset(next);
                }
            }
        }
    }
}

/// Release settled paths and deliver the resulting events.
///
/// Returns `Err(())` once every listener has shut down.
async fn process_changes(
    debouncer: &mut Debouncer,
    classifier: &EventClassifier<'_>,
    listeners: &mut Vec<Listener>,
) -> Result<(), ()> {
    let ready = debouncer.take_ready();
    if ready.is_empty() {
        return Ok(());
    }

    let events = classifier.classify(ready);
    if events.is_empty() {
        return Ok(());
    }

    log_events(&events);
    match events.as_slice() {
        [single] => crate::log!("watch"; "{} {}", single.kind.label(), single.key),
        many => crate::log!("watch"; "{} files changed", many.len()),
    }

    route(listeners, &events).await
}
