//! Freezing of the presented view without stopping ingestion.

use tracing::debug;

use crate::view::MergedView;

/// Whether presentation follows the live output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    /// Every tick's output is presented
    Live,
    /// The snapshot taken at pause time is presented
    Frozen,
}

/// Holds the presented view steady while paused.
#[derive(Debug, Default)]
pub struct PauseController {
    frozen: Option<MergedView>,
    new_logs_available: bool,
}

impl PauseController {
    /// Creates a live controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes on `current`. Pausing while frozen keeps the first snapshot.
    pub fn pause(&mut self, current: &MergedView) {
        if self.frozen.is_none() {
            debug!(records = current.len(), "view frozen");
            self.frozen = Some(current.clone());
            self.new_logs_available = false;
        }
    }

    /// Returns to live and hands back `latest` as the view to present.
    pub fn resume(&mut self, latest: MergedView) -> MergedView {
        if self.frozen.take().is_some() {
            debug!(records = latest.len(), "view resumed");
        }
        self.new_logs_available = false;
        latest
    }

    /// Chooses what to present given the latest live output.
    pub fn present(&mut self, latest: MergedView) -> MergedView {
        match &self.frozen {
            Some(snapshot) => {
                if !latest.same_snapshot(snapshot) && latest != *snapshot {
                    self.new_logs_available = true;
                }
                snapshot.clone()
            }
            None => latest,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PauseState {
        if self.frozen.is_some() {
            PauseState::Frozen
        } else {
            PauseState::Live
        }
    }

    /// Returns true while frozen.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.frozen.is_some()
    }

    /// Returns true if the live output moved on since the freeze.
    #[must_use]
    pub const fn new_logs_available(&self) -> bool {
        self.new_logs_available
    }
}
