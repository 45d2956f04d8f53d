use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tempfile::TempDir;

use super::*;
use crate::asset::{Asset, AssetContent, AssetStore, Checksum, FileKey, Layout, PathMatcher};

// =============================================================================
// Fake remote
// =============================================================================

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct FakeRemote {
    files: Mutex<FxHashMap<FileKey, Asset>>,
    fail_next: Mutex<Option<RemoteError>>,
    /// Runs inside the next checksum fetch (simulates concurrent local edits)
    during_fetch: Mutex<Option<Hook>>,
    stall: Mutex<Option<Duration>>,
    /// Keys listed but left out of body responses
    omit: Mutex<FxHashSet<FileKey>>,
    /// Body sent along with the next response without being asked for
    extra: Mutex<Option<Asset>>,
    body_fetches: AtomicUsize,
}

impl FakeRemote {
    fn put(&self, key: &str, body: &str) {
        let key = FileKey::new(key);
        let asset = Asset::new(key.clone(), AssetContent::Text(body.into()));
        self.files.lock().insert(key, asset);
    }

    fn remove(&self, key: &str) {
        self.files.lock().remove(key);
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn fetch_checksums(&self) -> Result<Vec<RemoteChecksum>, RemoteError> {
        let failure = self.fail_next.lock().take();
        if let Some(err) = failure {
            return Err(err);
        }
        let stall = *self.stall.lock();
        if let Some(stall) = stall {
            tokio::time::sleep(stall).await;
        }
        let listed: Vec<RemoteChecksum> = self
            .files
            .lock()
            .values()
            .map(|a| RemoteChecksum {
                key: a.key.clone(),
                checksum: a.checksum.clone(),
            })
            .collect();
        let hook = self.during_fetch.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        Ok(listed)
    }

    async fn fetch_assets(&self, keys: &[FileKey]) -> Result<Vec<Asset>, RemoteError> {
        self.body_fetches.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock();
        let omit = self.omit.lock();
        let mut assets: Vec<Asset> = keys
            .iter()
            .filter(|k| !omit.contains(*k))
            .filter_map(|k| files.get(k).cloned())
            .collect();
        assets.extend(self.extra.lock().take());
        Ok(assets)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct Fixture {
    _temp: TempDir,
    store: Arc<AssetStore>,
    remote: Arc<FakeRemote>,
    engine: ReconciliationEngine,
}

fn fixture(deletes: DeletePolicy) -> Fixture {
    fixture_with(deletes, InitialSync::Keep)
}

fn fixture_with(deletes: DeletePolicy, initial: InitialSync) -> Fixture {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(AssetStore::new(temp.path(), Layout::Theme));
    let remote = Arc::new(FakeRemote::default());
    let options = ReconcileOptions {
        scope: PathMatcher::new([DEFAULT_SCOPE], Vec::<String>::new()).unwrap(),
        deletes,
        initial,
        timeout: Duration::from_millis(200),
    };
    let engine = ReconciliationEngine::new(
        Arc::clone(&store),
        Arc::clone(&remote) as Arc<dyn RemoteStore>,
        options,
    );
    Fixture {
        _temp: temp,
        store,
        remote,
        engine,
    }
}

impl Fixture {
    /// Same content on both sides, snapshot primed.
    async fn synced(&self, files: &[(&str, &str)]) {
        for (key, body) in files {
            self.local(key, body);
            self.remote.put(key, body);
        }
        self.engine.prime().await.unwrap();
    }

    fn local(&self, key: &str, body: &str) {
        let asset = Asset::new(FileKey::new(key), AssetContent::Text(body.into()));
        self.store.write(asset).unwrap();
    }

    fn disk(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(FileKey::new(key).to_path(self.store.root())).ok()
    }
}

const EN: &str = "locales/en.default.json";

// =============================================================================
// Cycles
// =============================================================================

#[tokio::test]
async fn test_remote_change_overwrites_local() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{\"a\":1}")]).await;

    f.remote.put(EN, "{\"a\":2}");
    let report = f.engine.run_cycle().await.unwrap();

    assert_eq!(report.pulled, vec![FileKey::new(EN)]);
    assert_eq!(f.disk(EN).as_deref(), Some("{\"a\":2}"));
    assert_eq!(
        f.store.checksum(EN),
        Some(Checksum::compute(&FileKey::new(EN), b"{\"a\":2}"))
    );
}

#[tokio::test]
async fn test_converged_cycles_write_nothing() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{}"), ("templates/index.json", "{\"sections\":{}}")])
        .await;

    f.remote.put("config/settings_data.json", "{\"current\":\"Default\"}");
    assert_eq!(f.engine.run_cycle().await.unwrap().pulled.len(), 1);

    for _ in 0..3 {
        let report = f.engine.run_cycle().await.unwrap();
        assert!(report.is_empty());
    }
    assert_eq!(f.remote.body_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_local_edit_during_fetch_conflicts() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{\"a\":1}")]).await;
    let snapshot_before = f.engine.snapshot();

    f.remote.put(EN, "{\"a\":2}");
    let store = Arc::clone(&f.store);
    *f.remote.during_fetch.lock() = Some(Box::new(move || {
        let asset = Asset::new(FileKey::new(EN), AssetContent::Text("{\"a\":3}".into()));
        store.write(asset).unwrap();
    }));

    let err = f.engine.run_cycle().await.unwrap_err();
    match err {
        SyncError::Conflict(keys) => assert_eq!(keys, vec![FileKey::new(EN)]),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(f.disk(EN).as_deref(), Some("{\"a\":3}"));
    assert_eq!(f.remote.body_fetches.load(Ordering::SeqCst), 0);
    assert_eq!(*f.engine.snapshot(), *snapshot_before);
}

#[tokio::test]
async fn test_conflict_is_all_or_nothing() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{\"a\":1}"), ("templates/index.json", "{}")])
        .await;

    f.local(EN, "{\"a\":\"local\"}");
    f.remote.put(EN, "{\"a\":\"remote\"}");
    f.remote.put("templates/index.json", "{\"order\":[]}");

    let err = f.engine.run_cycle().await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(ref keys) if keys.len() == 1));
    assert!(err.to_string().contains(EN));

    // The non-conflicting key was not written either
    assert_eq!(f.disk("templates/index.json").as_deref(), Some("{}"));

    // Still conflicted on the next tick
    assert!(matches!(
        f.engine.run_cycle().await,
        Err(SyncError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_local_already_matching_remote_is_not_written() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{\"a\":1}")]).await;

    f.local(EN, "{\"a\":2}");
    f.remote.put(EN, "{\"a\":2}");

    let report = f.engine.run_cycle().await.unwrap();
    assert!(report.is_empty());
    assert_eq!(f.remote.body_fetches.load(Ordering::SeqCst), 0);
    assert_eq!(
        f.engine.snapshot().get(EN),
        f.store.checksum(EN).as_ref()
    );
}

#[tokio::test]
async fn test_non_json_outside_default_scope() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[("sections/header.liquid", "<header>")]).await;

    f.remote.put("sections/header.liquid", "<header class=x>");
    let report = f.engine.run_cycle().await.unwrap();

    assert!(report.is_empty());
    assert_eq!(f.disk("sections/header.liquid").as_deref(), Some("<header>"));
}

// =============================================================================
// Deletes
// =============================================================================

#[tokio::test]
async fn test_remote_delete_json_only() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{}"), ("templates/old.json", "{}")]).await;

    f.remote.remove("templates/old.json");
    let report = f.engine.run_cycle().await.unwrap();

    assert_eq!(report.deleted, vec![FileKey::new("templates/old.json")]);
    assert!(f.disk("templates/old.json").is_none());
    assert!(!f.store.contains("templates/old.json"));
    assert!(f.store.contains(EN));
}

#[tokio::test]
async fn test_remote_delete_disabled() {
    let f = fixture(DeletePolicy::Disabled);
    f.synced(&[("templates/old.json", "{}")]).await;

    f.remote.remove("templates/old.json");
    let report = f.engine.run_cycle().await.unwrap();

    assert!(report.is_empty());
    assert!(f.disk("templates/old.json").is_some());
    assert!(!f.engine.snapshot().contains("templates/old.json"));
}

#[tokio::test]
async fn test_remote_delete_of_local_edit_conflicts() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[("templates/old.json", "{}")]).await;

    f.local("templates/old.json", "{\"edited\":true}");
    f.remote.remove("templates/old.json");

    let err = f.engine.run_cycle().await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(_)));
    assert!(f.disk("templates/old.json").is_some());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_fetch_timeout_is_not_a_conflict() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{}")]).await;

    f.remote.put(EN, "{\"late\":true}");
    *f.remote.stall.lock() = Some(Duration::from_secs(5));

    let err = f.engine.run_cycle().await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout(_)));
    assert_eq!(f.disk(EN).as_deref(), Some("{}"));
}

#[tokio::test]
async fn test_remote_error_propagates() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{}")]).await;

    *f.remote.fail_next.lock() = Some(RemoteError::Unauthorized { status: 401 });
    let err = f.engine.run_cycle().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Remote(RemoteError::Unauthorized { status: 401 })
    ));

    // Next tick recovers
    assert!(f.engine.run_cycle().await.is_ok());
}

// =============================================================================
// Overrides
// =============================================================================

#[tokio::test]
async fn test_override_cleared_when_remote_matches() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{\"a\":1}")]).await;

    f.local(EN, "{\"a\":5}");
    f.store.mark_override(&FileKey::new(EN));

    // Remote still holds the old value: override stays
    f.engine.run_cycle().await.unwrap();
    assert!(f.store.is_override(EN));

    // Someone publishes the same content remotely
    f.remote.put(EN, "{\"a\":5}");
    f.engine.run_cycle().await.unwrap();
    assert!(!f.store.is_override(EN));
}

#[tokio::test]
async fn test_new_remote_file_is_pulled() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[]).await;

    f.remote.put("templates/product.json", "{\"sections\":{}}");
    let report = f.engine.run_cycle().await.unwrap();

    assert_eq!(report.pulled, vec![FileKey::new("templates/product.json")]);
    assert_eq!(
        f.disk("templates/product.json").as_deref(),
        Some("{\"sections\":{}}")
    );
}

#[tokio::test]
async fn test_missing_body_keeps_snapshot() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{\"a\":1}")]).await;
    let snapshot_before = f.engine.snapshot();

    f.remote.put(EN, "{\"a\":2}");
    f.remote.omit.lock().insert(FileKey::new(EN));

    for _ in 0..2 {
        let err = f.engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, SyncError::Remote(RemoteError::Decode(_))));
        assert!(err.to_string().contains("missing body"));
        assert_eq!(f.disk(EN).as_deref(), Some("{\"a\":1}"));
        assert_eq!(*f.engine.snapshot(), *snapshot_before);
    }

    // Body becomes available again: the pull is retried
    f.remote.omit.lock().clear();
    let report = f.engine.run_cycle().await.unwrap();
    assert_eq!(report.pulled, vec![FileKey::new(EN)]);
    assert_eq!(f.disk(EN).as_deref(), Some("{\"a\":2}"));
}

#[tokio::test]
async fn test_unrequested_body_rejected() {
    let f = fixture(DeletePolicy::JsonOnly);
    f.synced(&[(EN, "{\"a\":1}")]).await;

    f.remote.put(EN, "{\"a\":2}");
    *f.remote.extra.lock() = Some(Asset::new(
        FileKey::new("config/settings_data.json"),
        AssetContent::Text("{}".into()),
    ));

    let err = f.engine.run_cycle().await.unwrap_err();
    assert!(err.to_string().contains("config/settings_data.json"));
    assert_eq!(f.disk(EN).as_deref(), Some("{\"a\":1}"));
    assert!(f.disk("config/settings_data.json").is_none());
}

// =============================================================================
// Startup reconciliation
// =============================================================================

#[tokio::test]
async fn test_initial_keep_reports_divergence() {
    let f = fixture_with(DeletePolicy::JsonOnly, InitialSync::Keep);
    f.local(EN, "{\"a\":\"local\"}");
    f.local("templates/old.json", "{}");
    f.remote.put(EN, "{\"a\":\"remote\"}");
    f.remote.put("templates/index.json", "{}");

    let prime = f.engine.prime().await.unwrap();

    assert_eq!(prime.remote_files, 2);
    assert!(prime.applied.is_empty());
    assert_eq!(
        prime.diverged,
        vec![FileKey::new(EN), FileKey::new("templates/index.json")]
    );
    assert_eq!(f.disk(EN).as_deref(), Some("{\"a\":\"local\"}"));
    assert!(f.disk("templates/old.json").is_some());
    assert_eq!(f.remote.body_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_initial_remote_mirrors_remote() {
    let f = fixture_with(DeletePolicy::JsonOnly, InitialSync::Remote);
    f.local(EN, "{\"a\":\"local\"}");
    f.local("templates/old.json", "{}");
    f.local("sections/header.liquid", "<header>");
    f.remote.put(EN, "{\"a\":\"remote\"}");
    f.remote.put("templates/index.json", "{}");

    let prime = f.engine.prime().await.unwrap();

    assert_eq!(
        prime.applied.pulled,
        vec![FileKey::new(EN), FileKey::new("templates/index.json")]
    );
    assert_eq!(prime.applied.deleted, vec![FileKey::new("templates/old.json")]);
    assert!(prime.diverged.is_empty());
    assert_eq!(f.disk(EN).as_deref(), Some("{\"a\":\"remote\"}"));
    assert!(f.disk("templates/old.json").is_none());
    // Outside the sync scope
    assert!(f.disk("sections/header.liquid").is_some());

    // Later remote edits pull cleanly instead of conflicting
    f.remote.put(EN, "{\"a\":\"next\"}");
    let report = f.engine.run_cycle().await.unwrap();
    assert_eq!(report.pulled, vec![FileKey::new(EN)]);
}

#[tokio::test]
async fn test_initial_remote_without_deletes() {
    let f = fixture_with(DeletePolicy::Disabled, InitialSync::Remote);
    f.local("templates/old.json", "{}");
    f.remote.put(EN, "{}");

    let prime = f.engine.prime().await.unwrap();

    assert_eq!(prime.applied.pulled, vec![FileKey::new(EN)]);
    assert!(prime.applied.deleted.is_empty());
    assert!(f.disk("templates/old.json").is_some());
}

#[tokio::test]
async fn test_initial_remote_missing_body_fails_prime() {
    let f = fixture_with(DeletePolicy::JsonOnly, InitialSync::Remote);
    f.remote.put(EN, "{}");
    f.remote.omit.lock().insert(FileKey::new(EN));

    let err = f.engine.prime().await.unwrap_err();
    assert!(matches!(err, SyncError::Remote(RemoteError::Decode(_))));
    assert!(f.engine.snapshot().is_empty());
}
