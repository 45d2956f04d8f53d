//! Server-side preview state: app, store and extension payloads.
//!
//! Clients receive the whole payload once in the `connected` handshake and
//! afterwards only the extensions touched by an update.

use serde_json::{Map, Value, json};

use super::message::{Outgoing, UpdatePayload};

/// Mutable preview state owned by the broadcaster.
#[derive(Debug, Clone, Default)]
pub struct PayloadStore {
    app: Map<String, Value>,
    store: String,
    /// One JSON object per extension, identified by `uuid`
    extensions: Vec<Value>,
}

impl PayloadStore {
    pub fn new(app: Map<String, Value>, store: impl Into<String>, extensions: Vec<Value>) -> Self {
        Self {
            app,
            store: store.into(),
            extensions,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.app.get("apiKey").and_then(Value::as_str)
    }

    /// Full state for the `connected` handshake.
    pub fn connected(&self) -> Value {
        json!({
            "app": self.app,
            "store": self.store,
            "extensions": self.extensions,
        })
    }

    /// App and store plus only the listed extensions.
    pub fn filtered(&self, ids: &[String]) -> Value {
        let extensions: Vec<&Value> = self
            .extensions
            .iter()
            .filter(|ext| uuid_of(ext).is_some_and(|id| ids.iter().any(|i| i == id)))
            .collect();
        json!({
            "app": self.app,
            "store": self.store,
            "extensions": extensions,
        })
    }

    /// Theme file update: no extension state, just the changed files.
    pub fn files(&self, files: Vec<Value>) -> Value {
        json!({
            "app": self.app,
            "store": self.store,
            "extensions": [],
            "files": files,
        })
    }

    /// Shallow-merge app fields.
    pub fn update_app(&mut self, patch: Map<String, Value>) {
        self.app.extend(patch);
    }

    /// Merge updates into extensions with a matching `uuid`.
    ///
    /// Unknown uuids are dropped. Returns the uuids that were applied.
    pub fn update_extensions(&mut self, updates: Vec<Value>) -> Vec<String> {
        let mut applied = Vec::new();
        for update in updates {
            let Some(id) = uuid_of(&update).map(str::to_string) else {
                continue;
            };
            let Some(target) = self
                .extensions
                .iter_mut()
                .find(|ext| uuid_of(ext) == Some(id.as_str()))
            else {
                crate::debug!("extension"; "update for unknown extension {}", id);
                continue;
            };
            deep_merge(target, update);
            applied.push(id);
        }
        applied
    }

    /// Apply an inbound `update`: app first, then extensions.
    ///
    /// Returns `None` (nothing applied) when the message names a different app.
    pub fn apply_update(&mut self, update: UpdatePayload) -> Option<Vec<String>> {
        if let Some(app) = update.app {
            let incoming = app.get("apiKey").and_then(Value::as_str);
            if incoming != self.api_key() {
                crate::debug!("extension"; "ignoring update for app {:?}", incoming);
                return None;
            }
            self.update_app(app);
        }

        Some(
            update
                .extensions
                .map(|exts| self.update_extensions(exts))
                .unwrap_or_default(),
        )
    }

    /// Record the outcome of a build + push for one extension.
    pub fn set_status(&mut self, uuid: &str, status: &str) -> bool {
        let applied = self.update_extensions(vec![json!({
            "uuid": uuid,
            "development": {"status": status},
        })]);
        !applied.is_empty()
    }

    /// Re-broadcast form of a client `dispatch`: the inbound message with
    /// server state attached and the extension list emptied.
    pub fn dispatch(&self, mut raw: Map<String, Value>) -> Outgoing {
        let event = raw
            .remove("event")
            .and_then(|e| e.as_str().map(str::to_string))
            .unwrap_or_else(|| "dispatch".to_string());
        raw.remove("version");

        let mut data = match raw.remove("data") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        data.insert("extensions".into(), Value::Array(Vec::new()));
        data.insert("store".into(), Value::String(self.store.clone()));
        data.insert("app".into(), Value::Object(self.app.clone()));

        let mut msg = Outgoing::new(event, Value::Object(data));
        msg.extra = raw;
        msg
    }
}

fn uuid_of(ext: &Value) -> Option<&str> {
    ext.get("uuid").and_then(Value::as_str)
}

/// Recursive merge. Arrays of objects keyed by `target` are merged per
/// target; any other array is replaced.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        dst.insert(key, value);
                    }
                }
            }
        }
        (Value::Array(dst), Value::Array(src)) if is_targeted(&src) => {
            for item in src {
                let target = item.get("target").cloned();
                match dst.iter_mut().find(|d| d.get("target") == target.as_ref()) {
                    Some(existing) => deep_merge(existing, item),
                    None => dst.push(item),
                }
            }
        }
        (dst, src) => *dst = src,
    }
}

fn is_targeted(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(|i| i.get("target").is_some())
}
