use std::path::PathBuf;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::types::{ChangeKind, FileStat};

/// Default time a file's size and mtime must hold still before it is reported.
pub const STABILITY_MS: u64 = 400;

/// Upper bound on one idle sleep, so watch roots are re-checked periodically.
pub(super) const IDLE_TICK: Duration = Duration::from_secs(1);

/// A path waiting for its stat to settle.
#[derive(Debug)]
pub(super) struct Pending {
    pub(super) kind: ChangeKind,
    pub(super) stat: Option<FileStat>,
    pub(super) since: Instant,
}

/// Pure debouncer: per-path stability timing and event deduplication.
/// No store access, no pattern matching.
pub(super) struct Debouncer {
    /// Created / modified paths not yet stable
    pub(super) pending: FxHashMap<PathBuf, Pending>,
    /// Removals, released on the next tick
    pub(super) removed: Vec<PathBuf>,
    stability: Duration,
}

impl Debouncer {
    pub(super) fn new(stability: Duration) -> Self {
        Self {
            pending: FxHashMap::default(),
            removed: Vec::new(),
            stability,
        }
    }

    /// Add a notify event, applying dedup rules:
    /// - Remove + Create/Modify → Create/Modify (file was restored)
    /// - Modify + Remove → Remove (file was deleted)
    /// - Create + Remove → discarded (never reported)
    /// - Same type events: first kind wins, stability timer restarts
    pub(super) fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // Metadata-only changes (chmod, atime) never alter content
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            self.add_path(path.clone(), kind);
        }
    }

    pub(super) fn add_path(&mut self, path: PathBuf, kind: ChangeKind) {
        let now = Instant::now();
        match kind {
            ChangeKind::Removed => match self.pending.remove(&path) {
                Some(pending) if pending.kind == ChangeKind::Created => {
                    crate::debug!("watch"; "discard created+removed: {}", path.display());
                }
                _ => {
                    if !self.removed.contains(&path) {
                        self.removed.push(path);
                    }
                }
            },
            ChangeKind::Created | ChangeKind::Modified => {
                let restored = self.removed.iter().position(|p| *p == path);
                if let Some(idx) = restored {
                    crate::debug!("watch"; "restore removed->{}: {}", kind.label(), path.display());
                    self.removed.remove(idx);
                }
                let stat = FileStat::of(&path);
                self.pending
                    .entry(path)
                    .and_modify(|p| {
                        p.stat = stat;
                        p.since = now;
                    })
                    .or_insert(Pending {
                        kind,
                        stat,
                        since: now,
                    });
            }
        }
    }

    /// Release removals immediately and every pending path whose stat held
    /// still for the stability interval. Removals come first.
    pub(super) fn take_ready(&mut self) -> Vec<(PathBuf, ChangeKind)> {
        let mut ready: Vec<_> = self
            .removed
            .drain(..)
            .map(|p| (p, ChangeKind::Removed))
            .collect();

        let now = Instant::now();
        let stability = self.stability;
        let mut settled = Vec::new();

        self.pending.retain(|path, pending| {
            let stat = FileStat::of(path);
            let Some(current) = stat else {
                // Vanished while settling
                if pending.kind != ChangeKind::Created {
                    ready.push((path.clone(), ChangeKind::Removed));
                }
                return false;
            };
            if pending.stat != Some(current) {
                pending.stat = Some(current);
                pending.since = now;
                return true;
            }
            if now.duration_since(pending.since) < stability {
                return true;
            }
            settled.push((path.clone(), pending.kind));
            false
        });

        settled.sort_by(|a, b| a.0.cmp(&b.0));
        ready.extend(settled);
        ready
    }

    /// Precise sleep duration until the next path can settle.
    pub(super) fn sleep_duration(&self) -> Duration {
        if !self.removed.is_empty() {
            return Duration::from_millis(1);
        }

        self.pending
            .values()
            .map(|p| self.stability.saturating_sub(p.since.elapsed()))
            .min()
            .unwrap_or(IDLE_TICK)
            .clamp(Duration::from_millis(1), IDLE_TICK)
    }
}
