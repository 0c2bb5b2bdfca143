//! In-memory index of active triggers.
//!
//! Three mappings under one mutex:
//!
//! - `by_id` — trigger id → record
//! - `by_instrument` — instrument token → set of trigger ids (the hot-path
//!   lookup)
//! - `in_flight` — trigger ids with an execution attempt running
//!   (single-flight guard)
//!
//! The lock is held only for O(1)-ish work; lookups return owned snapshots
//! that callers iterate outside the lock. The durable store remains the
//! source of truth: the change listener rebuilds entries here whenever rows
//! move underneath us.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::types::{Trigger, TriggerStatus};

#[derive(Default)]
struct Inner {
    by_id: HashMap<Uuid, Trigger>,
    by_instrument: HashMap<u32, HashSet<Uuid>>,
    in_flight: HashSet<Uuid>,
}

/// Indexed container of active triggers with an in-flight marking.
#[derive(Default)]
pub struct TriggerIndex {
    inner: Mutex<Inner>,
}

impl TriggerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a trigger. Only `active` rows are accepted; anything else is
    /// ignored (the caller may be replaying a stale event).
    pub fn add(&self, trigger: Trigger) {
        if trigger.status != TriggerStatus::Active {
            tracing::debug!(id = %trigger.id, status = ?trigger.status, "not indexing non-active trigger");
            return;
        }
        let mut inner = self.inner.lock();
        inner
            .by_instrument
            .entry(trigger.instrument_token)
            .or_default()
            .insert(trigger.id);
        inner.by_id.insert(trigger.id, trigger);
    }

    /// Remove a trigger from every mapping. Idempotent.
    pub fn remove(&self, id: Uuid) {
        let mut inner = self.inner.lock();
        if let Some(trigger) = inner.by_id.remove(&id) {
            if let Some(bucket) = inner.by_instrument.get_mut(&trigger.instrument_token) {
                bucket.remove(&id);
                if bucket.is_empty() {
                    inner.by_instrument.remove(&trigger.instrument_token);
                }
            }
        }
        inner.in_flight.remove(&id);
    }

    /// Snapshot of the triggers indexed for one instrument, safe to iterate
    /// while concurrent mutations happen.
    pub fn for_instrument(&self, token: u32) -> Vec<Trigger> {
        let inner = self.inner.lock();
        match inner.by_instrument.get(&token) {
            Some(ids) => ids
                .iter()
                .filter_map(|id| inner.by_id.get(id).cloned())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Fetch one trigger by id.
    pub fn get(&self, id: Uuid) -> Option<Trigger> {
        self.inner.lock().by_id.get(&id).cloned()
    }

    /// Atomically claim the trigger for execution.
    ///
    /// Returns `true` iff the caller is now the sole processor. Unknown ids
    /// cannot be claimed.
    pub fn mark_processing(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock();
        if !inner.by_id.contains_key(&id) {
            return false;
        }
        inner.in_flight.insert(id)
    }

    /// Release the single-flight claim.
    pub fn unmark_processing(&self, id: Uuid) {
        self.inner.lock().in_flight.remove(&id);
    }

    /// The other leg of an OCO pair: a different trigger sharing `parent_id`.
    pub fn oco_sibling(&self, id: Uuid) -> Option<Uuid> {
        let inner = self.inner.lock();
        let parent = inner.by_id.get(&id)?.parent_id?;
        inner
            .by_id
            .values()
            .find(|t| t.id != id && t.parent_id == Some(parent))
            .map(|t| t.id)
    }

    /// Distinct instrument tokens currently indexed; the feed subscription set.
    pub fn subscribed_instruments(&self) -> Vec<u32> {
        self.inner.lock().by_instrument.keys().copied().collect()
    }

    /// Whether any trigger remains for the instrument.
    pub fn has_instrument(&self, token: u32) -> bool {
        self.inner.lock().by_instrument.contains_key(&token)
    }

    /// Number of indexed triggers.
    pub fn count(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    /// Drop everything. Used on shutdown after the feed is closed.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.by_id.clear();
        inner.by_instrument.clear();
        inner.in_flight.clear();
    }
}
