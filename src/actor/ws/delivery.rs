use serde_json::{Value, json};

use super::WsActor;
use super::registry::Delivery;
use crate::actor::messages::ChangeOrigin;
use crate::asset::FileKey;
use crate::reload::{ConnectionId, Inbound, Outgoing, parse_inbound};
use crate::utils::hash;

impl WsActor {
    /// Theme files changed: one `update` listing each key with its current
    /// checksum, or `deleted` when the store no longer holds it.
    pub(super) fn files_changed(&self, keys: &[FileKey], origin: ChangeOrigin) {
        if keys.is_empty() {
            return;
        }

        let files = keys
            .iter()
            .map(|key| {
                let checksum = self
                    .theme_store
                    .as_ref()
                    .and_then(|store| store.checksum(key.as_str()));
                match checksum {
                    Some(checksum) => json!({"key": key.as_str(), "checksum": checksum.as_str()}),
                    None => json!({"key": key.as_str(), "deleted": true}),
                }
            })
            .collect();

        let data = self.payload.files(files);
        let delivery = self.broadcast_update(data, true);
        crate::debug!(
            "ws";
            "{} files ({}) -> {} clients",
            keys.len(),
            origin.label(),
            delivery.sent
        );
    }

    /// A build + push succeeded for these extensions.
    pub(super) fn extensions_updated(&mut self, ids: &[String]) {
        let applied: Vec<String> = ids
            .iter()
            .filter(|id| self.payload.set_status(id, "success"))
            .cloned()
            .collect();
        if applied.is_empty() {
            return;
        }
        let data = self.payload.filtered(&applied);
        self.broadcast_update(data, true);
    }

    pub(super) fn handle_inbound(&mut self, from: ConnectionId, text: &str) {
        let inbound = match parse_inbound(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                crate::debug!("ws"; "malformed frame from {}: {}", from, e);
                return;
            }
        };

        match inbound {
            Inbound::Update(update) => {
                let Some(applied) = self.payload.apply_update(update) else {
                    return;
                };
                let data = self.payload.filtered(&applied);
                self.broadcast_update(data, true);
            }
            Inbound::Dispatch(raw) => {
                let msg = self.payload.dispatch(raw);
                self.registry.lock().broadcast(&msg.to_json(), None);
            }
            Inbound::Log(log) => {
                crate::log!("extension"; "[{}] {}", log.extension_name, log.formatted());
            }
            Inbound::Other(event) => {
                crate::debug!("ws"; "ignoring '{}' from {}", event, from);
            }
        }
    }

    /// Broadcast an `update`. With `dedup`, clients that already received an
    /// identical payload are skipped.
    fn broadcast_update(&self, data: Value, dedup: bool) -> Delivery {
        let fingerprint = dedup.then(|| hash::compute(data.to_string().as_bytes()));
        let text = Outgoing::update(data).to_json();
        let delivery = self.registry.lock().broadcast(&text, fingerprint);

        for id in &delivery.dropped {
            crate::debug!("ws"; "dropped {} during broadcast {}", id, delivery.generation);
        }
        delivery
    }
}
