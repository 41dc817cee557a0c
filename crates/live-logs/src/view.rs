//! Session-scoped view inputs and the derived, ordered view.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{SequenceId, SharedRecord};

/// Message the backend emits when a service has nothing running.
pub const NO_PODS_MESSAGE: &str = "No pods found";

/// Boundary between history and the current viewing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    opened_at: i64,
}

impl SessionWindow {
    /// Creates a window opened at the given epoch milliseconds.
    #[must_use]
    pub const fn new(opened_at: i64) -> Self {
        Self { opened_at }
    }

    /// Creates a window opened now.
    #[must_use]
    pub fn now() -> Self {
        Self::new(Utc::now().timestamp_millis())
    }

    /// Epoch milliseconds the view was opened at.
    #[must_use]
    pub const fn opened_at(&self) -> i64 {
        self.opened_at
    }

    /// Returns true if a record at `created_at` predates the session.
    #[must_use]
    pub const fn is_historical(&self, created_at: i64) -> bool {
        created_at < self.opened_at
    }
}

/// User-controlled switches read on every recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    /// Include the infra channel
    pub show_infra: bool,
    /// Include records older than the session window
    pub show_previous: bool,
    /// Presentation is frozen
    pub paused: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            show_infra: true,
            show_previous: false,
            paused: false,
        }
    }
}

/// Ordered, deduplicated records eligible for display.
///
/// Cloning is cheap: the record list is shared. Records are non-decreasing by
/// `(created_at, sequence_id)` and no sequence id appears twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedView {
    records: Arc<[SharedRecord]>,
}

impl Default for MergedView {
    fn default() -> Self {
        Self::from(Vec::new())
    }
}

impl From<Vec<SharedRecord>> for MergedView {
    fn from(records: Vec<SharedRecord>) -> Self {
        Self {
            records: Arc::from(records),
        }
    }
}

impl MergedView {
    /// Records in display order.
    #[must_use]
    pub fn as_slice(&self) -> &[SharedRecord] {
        &self.records
    }

    /// Iterates records in display order.
    pub fn iter(&self) -> impl Iterator<Item = &SharedRecord> {
        self.records.iter()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the view is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if both views share the same underlying snapshot.
    #[must_use]
    pub fn same_snapshot(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }

    /// Sequence ids in display order.
    #[must_use]
    pub fn sequence_ids(&self) -> Vec<SequenceId> {
        self.records.iter().map(|r| r.sequence_id).collect()
    }

    /// Returns true if the view is just the backend's "no pods" notice.
    #[must_use]
    pub fn is_placeholder_only(&self) -> bool {
        self.records
            .first()
            .is_some_and(|r| r.record.message().contains(NO_PODS_MESSAGE))
    }

    /// Returns true if records come from more than one container.
    #[must_use]
    pub fn has_multiple_containers(&self) -> bool {
        let containers: HashSet<Option<&str>> = self
            .records
            .iter()
            .map(|r| r.record.line().container.as_deref())
            .collect();
        containers.len() > 1
    }

    /// Distinct pod names in order of first appearance.
    #[must_use]
    pub fn pods(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter_map(|r| r.record.pod_name())
            .filter(|pod| seen.insert(*pod))
            .collect()
    }
}
