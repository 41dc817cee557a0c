//! Append-only per-channel record storage.

use std::sync::Arc;

use crate::types::{ChannelKind, SequenceId, SequencedRecord, SharedRecord};

/// Every record received on one channel since the channel was (re)activated.
///
/// There is no removal API: records stay in arrival order for the lifetime of
/// the buffer, whatever the current visibility settings are. A subscription
/// change replaces the whole buffer instead of clearing it.
///
/// The buffer is unbounded; its growth is bounded only by the length of the
/// viewing session.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    kind: ChannelKind,
    records: Vec<SharedRecord>,
}

impl ChannelBuffer {
    /// Creates an empty buffer for a channel.
    #[must_use]
    pub const fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
        }
    }

    /// Appends a record in arrival order.
    pub fn append(&mut self, record: SequencedRecord) {
        self.records.push(Arc::new(record));
    }

    /// Channel this buffer belongs to.
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// All records, in arrival order.
    #[must_use]
    pub fn as_slice(&self) -> &[SharedRecord] {
        &self.records
    }

    /// Returns the number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence id of the most recent arrival.
    #[must_use]
    pub fn last_sequence_id(&self) -> Option<SequenceId> {
        self.records.last().map(|r| r.sequence_id)
    }
}
