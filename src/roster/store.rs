//! In-memory roster keyed by attendance date.
//!
//! The store is the only mutable state of the service. Every operation takes
//! the internal lock for one complete map operation and never holds it
//! across an `.await`, so webhook intake and the weekly cycle can interleave
//! freely while the cycle waits on network I/O.

use crate::roster::RosterKey;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Chat-platform account identifier of a participant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap a raw platform user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw id as sent by the platform.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Snapshot of one roster bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Bucket key.
    pub key: RosterKey,
    /// Participants in registration order, each at most once.
    pub participants: Vec<ParticipantId>,
}

/// Result of evicting the exported part of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictOutcome {
    /// The entry is gone.
    Removed,
    /// Participants registered after the snapshot remain for the next cycle.
    Retained {
        /// Number of participants still in the entry.
        remaining: usize,
    },
    /// There was no entry for the key.
    Missing,
}

/// Process-owned mapping from [`RosterKey`] to its participants.
#[derive(Debug, Default)]
pub struct RosterStore {
    entries: Mutex<BTreeMap<RosterKey, Vec<ParticipantId>>>,
}

impl RosterStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<RosterKey, Vec<ParticipantId>>> {
        // Each critical section is a single map operation, so the data is
        // consistent even if a holder panicked.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add `participant` to the bucket for `key`, creating it if absent.
    ///
    /// Idempotent: returns `false` when the participant was already present.
    pub fn register(&self, key: RosterKey, participant: ParticipantId) -> bool {
        let mut entries = self.lock();
        let bucket = entries.entry(key).or_default();
        if bucket.contains(&participant) {
            return false;
        }
        bucket.push(participant);
        true
    }

    /// Snapshot of every entry at call time, in key order.
    ///
    /// Each call takes a fresh snapshot; later mutations do not affect a
    /// snapshot already returned.
    #[must_use]
    pub fn entries(&self) -> Vec<RosterEntry> {
        self.lock()
            .iter()
            .map(|(key, participants)| RosterEntry {
                key: key.clone(),
                participants: participants.clone(),
            })
            .collect()
    }

    /// Snapshot of a single entry.
    #[must_use]
    pub fn get(&self, key: &RosterKey) -> Option<RosterEntry> {
        self.lock().get(key).map(|participants| RosterEntry {
            key: key.clone(),
            participants: participants.clone(),
        })
    }

    /// Remove the entry for `key` entirely. Returns `false` if absent.
    ///
    /// The weekly cycle uses [`Self::evict_exported`] so that late
    /// registrations survive; this drops the whole bucket regardless of
    /// what was exported.
    pub fn evict(&self, key: &RosterKey) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove the `exported` participants from `key`, dropping the entry
    /// once it is empty.
    pub fn evict_exported(&self, key: &RosterKey, exported: &[ParticipantId]) -> EvictOutcome {
        let mut entries = self.lock();
        let Some(bucket) = entries.get_mut(key) else {
            return EvictOutcome::Missing;
        };
        bucket.retain(|participant| !exported.contains(participant));
        if bucket.is_empty() {
            entries.remove(key);
            EvictOutcome::Removed
        } else {
            EvictOutcome::Retained {
                remaining: bucket.len(),
            }
        }
    }

    /// Number of dated buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total registrations across all buckets.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }
}
