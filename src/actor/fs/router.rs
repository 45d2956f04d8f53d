use tokio::sync::mpsc;

use crate::actor::messages::{ChangeEvent, ChangeOrigin, DraftMsg, WsMsg};

/// A registered consumer of change events.
pub enum Listener {
    /// Live-reload broadcaster: receives the changed keys
    Preview(mpsc::Sender<WsMsg>),
    /// Extension push loop: receives the full events
    Draft(mpsc::Sender<DraftMsg>),
}

impl Listener {
    fn name(&self) -> &'static str {
        match self {
            Self::Preview(_) => "preview",
            Self::Draft(_) => "draft",
        }
    }

    /// Returns false when the listener hung up.
    async fn send(&self, events: &[ChangeEvent]) -> bool {
        match self {
            Self::Preview(tx) => {
                let keys = events.iter().map(|e| e.key.clone()).collect();
                let msg = WsMsg::FilesChanged {
                    keys,
                    origin: ChangeOrigin::Local,
                };
                tx.send(msg).await.is_ok()
            }
            Self::Draft(tx) => tx.send(DraftMsg::Changed(events.to_vec())).await.is_ok(),
        }
    }
}

pub(super) fn log_events(events: &[ChangeEvent]) {
    for event in events {
        crate::debug!("watch"; "{}: {}", event.kind.label(), event.key);
    }
}

/// Deliver one batch to every listener, dropping listeners that hung up.
///
/// Returns `Err(())` once no listener is left.
pub(super) async fn route(listeners: &mut Vec<Listener>, events: &[ChangeEvent]) -> Result<(), ()> {
    let mut closed = Vec::new();
    for (idx, listener) in listeners.iter().enumerate() {
        if !listener.send(events).await {
            crate::debug!("watch"; "{} listener closed", listener.name());
            closed.push(idx);
        }
    }
    for idx in closed.into_iter().rev() {
        listeners.remove(idx);
    }

    if listeners.is_empty() { Err(()) } else { Ok(()) }
}
