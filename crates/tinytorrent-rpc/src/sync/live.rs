//! Throttled snapshot diffing and push fan-out.
//!
//! # Design
//! - Runs on the event-loop thread once per loop iteration.
//! - Patches are computed at most once per `patch_interval`; intermediate
//!   generations collapse into the latest one.
//! - Clients anchored at the last broadcast generation share one encoded
//!   patch. Clients that joined mid-cycle get a patch from their own anchor.

use std::sync::Arc;
use std::time::Instant;

use tinytorrent_config::SyncTiming;
use tinytorrent_telemetry::Metrics;
use tracing::{debug, trace};

use crate::state::Lifecycle;
use crate::sync::diff::{self, SnapshotDiff};
use crate::sync::feed::SnapshotFeed;
use crate::sync::registry::{Anchor, Catchup, ClientRegistry};
use crate::sync::wire::{self, SyncEvent};

pub(crate) struct LiveUpdates {
    feed: SnapshotFeed,
    registry: Arc<ClientRegistry>,
    lifecycle: Arc<Lifecycle>,
    metrics: Metrics,
    timing: SyncTiming,
    last_sent: Anchor,
    pending: Option<Anchor>,
    blocklist_entries: usize,
    last_patch_at: Option<Instant>,
    last_ping_at: Instant,
}

impl LiveUpdates {
    pub(crate) fn new(
        feed: SnapshotFeed,
        registry: Arc<ClientRegistry>,
        lifecycle: Arc<Lifecycle>,
        metrics: Metrics,
        timing: SyncTiming,
        now: Instant,
    ) -> Self {
        let last_sent = registry.stamp(feed.current());
        let blocklist_entries = feed.blocklist_entries();
        Self {
            feed,
            registry,
            lifecycle,
            metrics,
            timing,
            last_sent,
            pending: None,
            blocklist_entries,
            last_patch_at: None,
            last_ping_at: now,
        }
    }

    /// One maintenance pass: capture, patch when due, events, pings.
    pub(crate) fn tick(&mut self, now: Instant) {
        if self.lifecycle.is_destroying() {
            return;
        }

        let current = self.registry.stamp(self.feed.current());
        if self.registry.is_empty() {
            self.pending = None;
            self.last_sent = current;
        } else if self.pending.is_some()
            || diff::session_changed(&self.last_sent.snapshot, &current.snapshot)
        {
            self.pending = Some(current);
        }

        if self.patch_due(now)
            && let Some(pending) = self.pending.take()
        {
            self.emit_patch(pending, now);
        }

        let blocklist_entries = self.feed.blocklist_entries();
        if blocklist_entries != self.blocklist_entries {
            self.blocklist_entries = blocklist_entries;
            self.broadcast_event(&SyncEvent::BlocklistUpdated {
                count: blocklist_entries,
            });
        }

        if now.duration_since(self.last_ping_at) >= self.timing.ping_interval {
            self.last_ping_at = now;
            self.registry.ping_all();
        }
    }

    fn patch_due(&self, now: Instant) -> bool {
        self.last_patch_at
            .is_none_or(|at| now.duration_since(at) >= self.timing.patch_interval)
    }

    fn emit_patch(&mut self, pending: Anchor, now: Instant) {
        let previous = std::mem::replace(&mut self.last_sent, pending.clone());
        let changes = diff::diff(&previous.snapshot, &pending.snapshot);
        let shared = if changes.is_empty() {
            None
        } else {
            wire::encode_patch(pending.sequence, &pending.snapshot, &changes)
        };

        let mut sent = 0;
        for Catchup { handle, from } in self.registry.advance(&pending) {
            let own;
            let payload = if from.same_generation(&previous) {
                shared.as_deref()
            } else {
                own = catch_up(&from, &pending);
                own.as_deref()
            };
            if let Some(payload) = payload
                && self.registry.deliver(&handle, payload)
            {
                sent += 1;
            }
        }
        self.metrics.add_ws_messages("patch", sent);

        if changes.is_empty() {
            return;
        }
        self.last_patch_at = Some(now);
        trace!(
            sequence = pending.sequence,
            clients = sent,
            added = changes.added.len(),
            updated = changes.updated.len(),
            removed = changes.removed.len(),
            "push patch emitted"
        );
        self.announce(&changes);
    }

    fn announce(&self, changes: &SnapshotDiff<'_>) {
        for torrent in &changes.added {
            self.broadcast_event(&SyncEvent::TorrentAdded { id: torrent.id });
        }
        for id in &changes.finished {
            self.broadcast_event(&SyncEvent::TorrentFinished { id: *id });
        }
    }

    fn broadcast_event(&self, event: &SyncEvent) {
        let Some(payload) = wire::encode_event(event) else {
            return;
        };
        let reached = self.registry.broadcast(&payload);
        self.metrics.add_ws_messages("event", reached);
        debug!(event = event.name(), clients = reached, "push event broadcast");
    }
}

/// Patch taking a mid-cycle client from its own anchor to `target`.
fn catch_up(from: &Anchor, target: &Anchor) -> Option<String> {
    let changes = diff::diff(&from.snapshot, &target.snapshot);
    if changes.is_empty() {
        return None;
    }
    wire::encode_patch(target.sequence, &target.snapshot, &changes)
}
