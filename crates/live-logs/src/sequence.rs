//! Arrival-order stamping shared by both channels of a session.

use crate::types::SequenceId;

/// Hands out strictly increasing [`SequenceId`]s in arrival order.
///
/// One assigner serves both channels, so ids form a total order over every
/// record a session has received. Ids start at 1 and only restart when a new
/// assigner is created for a new session.
#[derive(Debug)]
pub struct SequenceAssigner {
    next: u64,
}

impl Default for SequenceAssigner {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceAssigner {
    /// Creates an assigner whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next id.
    pub const fn next_id(&mut self) -> SequenceId {
        let id = SequenceId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.next - 1
    }
}
