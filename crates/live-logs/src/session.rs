//! The session object: everything one open log view owns.
//!
//! A [`LogSession`] is created when a log view opens for a subscription key
//! and dropped when the view closes. It owns both channels, the sequence
//! assigner, the session window, the view switches, the batch scheduler, the
//! pause controller and the pod color table. Nothing here is global, so any
//! number of sessions can coexist.
//!
//! The session itself is synchronous and takes the current [`Instant`] as an
//! argument; [`crate::driver::SessionDriver`] wires it to real events.

use std::fmt;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{LogChannel, SubscriptionKey};
use crate::color::PodColorAssigner;
use crate::config::LiveLogsConfig;
use crate::error::Result;
use crate::merge::merge_filter_sort;
use crate::pause::PauseController;
use crate::row::{project_rows, PresentationRow, TimeMode};
use crate::scheduler::BatchScheduler;
use crate::sequence::SequenceAssigner;
use crate::transport::SharedTransport;
use crate::types::{ChannelKind, LogRecord, RawLogRecord, SequenceId, SequencedRecord};
use crate::view::{MergedView, SessionWindow, ViewState};

/// Identifier of a session, used to correlate log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Creates a random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the rendering surface is currently shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveView {
    /// Presented records
    pub view: MergedView,
    /// Presentation is frozen
    pub paused: bool,
    /// Live output has moved on since the freeze
    pub new_logs_available: bool,
}

impl LiveView {
    /// Returns true if `other` would render differently.
    #[must_use]
    pub fn differs(&self, other: &Self) -> bool {
        self.paused != other.paused
            || self.new_logs_available != other.new_logs_available
            || !self.view.same_snapshot(&other.view)
    }
}

/// State of one open log view.
pub struct LogSession {
    id: SessionId,
    config: LiveLogsConfig,
    transport: SharedTransport,
    key: Option<SubscriptionKey>,
    infra_enabled: bool,
    service: LogChannel,
    infra: LogChannel,
    sequence: SequenceAssigner,
    window: SessionWindow,
    view_state: ViewState,
    scheduler: BatchScheduler,
    pause: PauseController,
    colors: PodColorAssigner,
    time_mode: TimeMode,
    live: MergedView,
    presented: MergedView,
}

impl fmt::Debug for LogSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSession")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("window", &self.window)
            .field("view_state", &self.view_state)
            .field("service", &self.service.state())
            .field("infra", &self.infra.state())
            .field("presented", &self.presented.len())
            .finish_non_exhaustive()
    }
}

impl LogSession {
    /// Opens a session and activates whichever channels can be activated.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid. Channels that cannot
    /// subscribe are left inactive rather than failing the session.
    pub fn open(
        config: LiveLogsConfig,
        transport: SharedTransport,
        key: Option<SubscriptionKey>,
        window: SessionWindow,
    ) -> Result<Self> {
        config.validate()?;

        let mut session = Self {
            id: SessionId::new(),
            scheduler: BatchScheduler::from_config(&config),
            view_state: ViewState {
                show_infra: config.show_infra,
                show_previous: config.show_previous,
                paused: false,
            },
            infra_enabled: config.infra_logs_enabled,
            time_mode: config.time_mode,
            config,
            transport,
            key,
            service: LogChannel::new(ChannelKind::Service),
            infra: LogChannel::new(ChannelKind::Infra),
            sequence: SequenceAssigner::new(),
            window,
            pause: PauseController::new(),
            colors: PodColorAssigner::new(),
            live: MergedView::default(),
            presented: MergedView::default(),
        };

        session
            .service
            .activate(session.key.clone(), true, session.transport.as_ref());
        session.infra.activate(
            session.key.clone(),
            session.infra_enabled,
            session.transport.as_ref(),
        );

        info!(
            session_id = %session.id,
            key = ?session.key.as_ref().map(ToString::to_string),
            opened_at = session.window.opened_at(),
            service_active = session.service.is_active(),
            infra_active = session.infra.is_active(),
            "log session opened"
        );
        Ok(session)
    }

    /// Points the session at a different subscription key.
    ///
    /// A changed key starts over: both channels resubscribe with empty
    /// buffers, sequence ids restart, the window moves to `window`, colors
    /// are forgotten and a freeze is lifted. View switches are kept. Returns
    /// false if the key is unchanged.
    pub fn retarget(&mut self, key: Option<SubscriptionKey>, window: SessionWindow) -> bool {
        if self.key == key {
            return false;
        }

        info!(
            session_id = %self.id,
            key = ?key.as_ref().map(ToString::to_string),
            "log session retargeted"
        );
        self.key = key;
        self.service
            .activate(self.key.clone(), true, self.transport.as_ref());
        self.infra
            .activate(self.key.clone(), self.infra_enabled, self.transport.as_ref());
        self.sequence = SequenceAssigner::new();
        self.window = window;
        self.scheduler.clear();
        self.pause = PauseController::new();
        self.view_state.paused = false;
        self.colors = PodColorAssigner::new();
        self.recompute();
        true
    }

    /// Flips the infra feature toggle.
    ///
    /// The infra channel resubscribes (or tears down) with an empty buffer.
    /// Returns false if the toggle is unchanged.
    pub fn set_infra_enabled(&mut self, enabled: bool) -> bool {
        if self.infra_enabled == enabled {
            return false;
        }
        self.infra_enabled = enabled;
        self.infra
            .activate(self.key.clone(), enabled, self.transport.as_ref());
        self.scheduler.clear();
        self.recompute();
        true
    }

    /// Stamps and buffers a record that arrived on `kind` at `now`.
    ///
    /// Returns the assigned id, or `None` if the channel is inactive, in which
    /// case the record is ignored.
    pub fn deliver(
        &mut self,
        kind: ChannelKind,
        raw: RawLogRecord,
        now: Instant,
    ) -> Option<SequenceId> {
        let channel = match kind {
            ChannelKind::Service => &mut self.service,
            ChannelKind::Infra => &mut self.infra,
        };
        if !channel.is_active() {
            debug!(session_id = %self.id, channel = %kind, "delivery to inactive channel ignored");
            return None;
        }

        let record = LogRecord::from_raw(kind, raw);
        if record.line().malformed {
            warn!(
                session_id = %self.id,
                channel = %kind,
                created_at = record.created_at(),
                "malformed record, missing fields defaulted"
            );
        }

        let sequence_id = self.sequence.next_id();
        channel.append(SequencedRecord {
            sequence_id,
            record,
        });
        self.scheduler.note_growth(now);
        Some(sequence_id)
    }

    /// Buffers every delivery already waiting on either channel.
    ///
    /// Service deliveries are taken before infra ones. Returns how many
    /// records were buffered.
    pub fn pump(&mut self, now: Instant) -> usize {
        let service = self.service.drain();
        let infra = self.infra.drain();

        service
            .into_iter()
            .map(|raw| (ChannelKind::Service, raw))
            .chain(infra.into_iter().map(|raw| (ChannelKind::Infra, raw)))
            .filter_map(|(kind, raw)| self.deliver(kind, raw, now))
            .count()
    }

    /// Waits for the next delivery on either channel.
    ///
    /// Cancel safe: a delivery is only taken from a channel when this
    /// future completes.
    pub async fn next_delivery(&mut self) -> (ChannelKind, RawLogRecord) {
        let Self { service, infra, .. } = self;
        tokio::select! {
            record = service.recv() => (ChannelKind::Service, record),
            record = infra.recv() => (ChannelKind::Infra, record),
        }
    }

    /// Recomputes if a batch tick is due at `now`.
    pub fn tick(&mut self, now: Instant) -> Option<MergedView> {
        if !self.scheduler.poll(now) {
            return None;
        }
        let view = self.recompute();
        debug!(
            session_id = %self.id,
            ticks = self.scheduler.ticks(),
            records = view.len(),
            "recompute tick"
        );
        Some(view)
    }

    /// Buffers waiting deliveries and recomputes immediately.
    pub fn flush(&mut self, now: Instant) -> MergedView {
        self.pump(now);
        self.scheduler.clear();
        self.recompute()
    }

    fn recompute(&mut self) -> MergedView {
        self.live = merge_filter_sort(
            self.service.buffer().as_slice(),
            self.infra.buffer().as_slice(),
            &self.view_state,
            &self.window,
        );
        self.presented = self.pause.present(self.live.clone());
        self.presented.clone()
    }

    /// Freezes presentation on the buffers as they are now.
    ///
    /// Growth still waiting for a tick is folded in first, so the frozen
    /// view matches what resuming without new arrivals would show.
    pub fn pause(&mut self) {
        if !self.pause.is_paused() && self.scheduler.is_pending() {
            self.scheduler.clear();
            self.recompute();
        }
        self.view_state.paused = true;
        self.pause.pause(&self.presented);
    }

    /// Unfreezes and presents the latest output, including everything that
    /// arrived while frozen.
    pub fn resume(&mut self) -> MergedView {
        self.view_state.paused = false;
        self.scheduler.clear();
        self.live = merge_filter_sort(
            self.service.buffer().as_slice(),
            self.infra.buffer().as_slice(),
            &self.view_state,
            &self.window,
        );
        self.presented = self.pause.resume(self.live.clone());
        self.presented.clone()
    }

    /// Pauses or resumes.
    pub fn set_paused(&mut self, paused: bool) {
        if paused {
            self.pause();
        } else if self.pause.is_paused() {
            self.resume();
        }
    }

    /// Shows or hides the infra channel. Hidden records keep buffering.
    pub fn set_show_infra(&mut self, show: bool) {
        if self.view_state.show_infra != show {
            self.view_state.show_infra = show;
            self.scheduler.clear();
            self.recompute();
        }
    }

    /// Shows or hides records older than the session window.
    pub fn set_show_previous(&mut self, show: bool) {
        if self.view_state.show_previous != show {
            self.view_state.show_previous = show;
            self.scheduler.clear();
            self.recompute();
        }
    }

    /// Changes the time zone used for rows.
    pub const fn set_time_mode(&mut self, mode: TimeMode) {
        self.time_mode = mode;
    }

    /// Rows for the presented view, in display order.
    pub fn rows(&mut self) -> Vec<PresentationRow> {
        project_rows(&self.presented, &mut self.colors, self.time_mode)
    }

    /// Presented view plus pause flags.
    #[must_use]
    pub fn snapshot(&self) -> LiveView {
        LiveView {
            view: self.presented.clone(),
            paused: self.pause.is_paused(),
            new_logs_available: self.pause.new_logs_available(),
        }
    }

    /// Deactivates both channels and discards the session.
    pub fn close(mut self) {
        self.service.deactivate();
        self.infra.deactivate();
        info!(
            session_id = %self.id,
            sequence_ids = self.sequence.issued(),
            "log session closed"
        );
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &LiveLogsConfig {
        &self.config
    }

    /// Current subscription key.
    #[must_use]
    pub const fn key(&self) -> Option<&SubscriptionKey> {
        self.key.as_ref()
    }

    /// The presented view.
    #[must_use]
    pub const fn view(&self) -> &MergedView {
        &self.presented
    }

    /// The latest merge output, ignoring any freeze.
    #[must_use]
    pub const fn live_view(&self) -> &MergedView {
        &self.live
    }

    /// Current view switches.
    #[must_use]
    pub const fn view_state(&self) -> ViewState {
        self.view_state
    }

    /// Session window.
    #[must_use]
    pub const fn window(&self) -> SessionWindow {
        self.window
    }

    /// One of the two channels.
    #[must_use]
    pub const fn channel(&self, kind: ChannelKind) -> &LogChannel {
        match kind {
            ChannelKind::Service => &self.service,
            ChannelKind::Infra => &self.infra,
        }
    }

    /// Returns true while presentation is frozen.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Returns true if output moved on while frozen.
    #[must_use]
    pub const fn new_logs_available(&self) -> bool {
        self.pause.new_logs_available()
    }

    /// When the next batch tick is due, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Pod color table.
    #[must_use]
    pub const fn colors(&self) -> &PodColorAssigner {
        &self.colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelState, InactiveReason};
    use crate::transport::MemoryTransport;
    use std::sync::Arc;
    use std::time::Duration;

    const INTERVAL: Duration = Duration::from_millis(400);

    fn key() -> SubscriptionKey {
        SubscriptionKey::new("org", "cluster", "project", "env", "svc")
    }

    fn open(transport: &Arc<MemoryTransport>, opened_at: i64) -> LogSession {
        let session = LogSession::open(
            LiveLogsConfig::default().with_time_mode(TimeMode::Utc),
            Arc::clone(transport) as SharedTransport,
            Some(key()),
            SessionWindow::new(opened_at),
        );
        session.expect("session opens")
    }

    fn messages(view: &MergedView) -> Vec<String> {
        view.iter().map(|r| r.record.message().to_string()).collect()
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    #[test]
    fn open_activates_both_channels() {
        let transport = MemoryTransport::shared();
        let session = open(&transport, 0);

        assert!(session.channel(ChannelKind::Service).is_active());
        assert!(session.channel(ChannelKind::Infra).is_active());
        assert!(session.view().is_empty());
    }

    #[test]
    fn open_rejects_invalid_config() {
        let transport: SharedTransport = MemoryTransport::shared();
        let config = LiveLogsConfig::default().with_batch_interval(Duration::ZERO);

        let result = LogSession::open(config, transport, Some(key()), SessionWindow::new(0));
        assert!(result.is_err());
    }

    #[test]
    fn infra_disabled_by_config() {
        let transport = MemoryTransport::shared();
        let session = LogSession::open(
            LiveLogsConfig::default().with_infra_logs_enabled(false),
            Arc::clone(&transport) as SharedTransport,
            Some(key()),
            SessionWindow::new(0),
        );
        assert!(session.is_ok());

        if let Ok(session) = session {
            assert_eq!(
                session.channel(ChannelKind::Infra).state(),
                ChannelState::Inactive(InactiveReason::Disabled)
            );
            assert!(session.channel(ChannelKind::Service).is_active());
        }
    }

    #[test]
    fn missing_key_leaves_session_idle() {
        let transport = MemoryTransport::shared();
        let session = LogSession::open(
            LiveLogsConfig::default(),
            Arc::clone(&transport) as SharedTransport,
            None,
            SessionWindow::new(0),
        );
        assert!(session.is_ok());

        if let Ok(mut session) = session {
            let id = session.deliver(ChannelKind::Service, RawLogRecord::new(1, "x"), Instant::now());
            assert_eq!(id, None);
            assert!(session.next_deadline().is_none());
        }
    }

    #[test]
    fn close_unsubscribes() {
        let transport = MemoryTransport::shared();
        let session = open(&transport, 0);
        assert_eq!(transport.subscriber_count(ChannelKind::Service, &key()), 1);

        session.close();

        assert_eq!(transport.subscriber_count(ChannelKind::Service, &key()), 0);
        assert_eq!(transport.subscriber_count(ChannelKind::Infra, &key()), 0);
    }

    // ===========================================
    // Ingestion and ticks
    // ===========================================

    #[test]
    fn deliveries_assign_shared_sequence() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);
        let now = Instant::now();

        let a = session.deliver(ChannelKind::Service, RawLogRecord::new(1, "a"), now);
        let b = session.deliver(ChannelKind::Infra, RawLogRecord::new(1, "b"), now);
        let c = session.deliver(ChannelKind::Service, RawLogRecord::new(1, "c"), now);

        assert_eq!(a, Some(SequenceId(1)));
        assert_eq!(b, Some(SequenceId(2)));
        assert_eq!(c, Some(SequenceId(3)));
    }

    #[test]
    fn tick_waits_for_batch_interval() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);
        let start = Instant::now();

        session.deliver(ChannelKind::Service, RawLogRecord::new(10, "a"), start);

        assert!(session.tick(start + Duration::from_millis(100)).is_none());
        assert!(session.view().is_empty());

        let view = session.tick(start + INTERVAL);
        assert_eq!(view.map(|v| v.len()), Some(1));
        assert_eq!(session.view().len(), 1);
    }

    #[test]
    fn pump_takes_transport_deliveries() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);

        transport.publish(ChannelKind::Infra, &key(), RawLogRecord::new(2, "proxy"));
        transport.publish(ChannelKind::Service, &key(), RawLogRecord::new(1, "app"));

        let now = Instant::now();
        assert_eq!(session.pump(now), 2);

        let view = session.flush(now);
        assert_eq!(messages(&view), vec!["app", "proxy"]);
    }

    #[test]
    fn malformed_record_is_kept() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);

        session.deliver(ChannelKind::Service, RawLogRecord::new(5, "fine"), Instant::now());
        session.deliver(ChannelKind::Service, RawLogRecord::default(), Instant::now());
        let view = session.flush(Instant::now());

        assert_eq!(view.len(), 2);
        assert!(view.as_slice()[0].record.line().malformed);
        assert_eq!(view.as_slice()[0].record.created_at(), 0);
    }

    // ===========================================
    // Controls
    // ===========================================

    #[test]
    fn show_infra_toggle_recomputes_immediately() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);
        let now = Instant::now();
        session.deliver(ChannelKind::Service, RawLogRecord::new(1, "app"), now);
        session.deliver(ChannelKind::Infra, RawLogRecord::new(2, "proxy"), now);
        session.flush(now);

        session.set_show_infra(false);
        assert_eq!(messages(session.view()), vec!["app"]);

        session.set_show_infra(true);
        assert_eq!(messages(session.view()), vec!["app", "proxy"]);
    }

    #[test]
    fn show_previous_toggle() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 1_000);
        let now = Instant::now();
        session.deliver(ChannelKind::Service, RawLogRecord::new(500, "old"), now);
        session.deliver(ChannelKind::Service, RawLogRecord::new(1_500, "new"), now);
        session.flush(now);
        assert_eq!(messages(session.view()), vec!["new"]);

        session.set_show_previous(true);
        assert_eq!(messages(session.view()), vec!["old", "new"]);
    }

    #[test]
    fn pause_freezes_and_resume_catches_up() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);
        let start = Instant::now();
        session.deliver(ChannelKind::Service, RawLogRecord::new(1, "a"), start);
        session.flush(start);

        session.pause();
        session.deliver(ChannelKind::Service, RawLogRecord::new(2, "b"), start);
        assert!(session.tick(start + INTERVAL).is_some());

        assert_eq!(messages(session.view()), vec!["a"]);
        assert_eq!(session.live_view().len(), 2);
        assert!(session.is_paused());
        assert!(session.view_state().paused);
        assert!(session.new_logs_available());

        let resumed = session.resume();
        assert_eq!(messages(&resumed), vec!["a", "b"]);
        assert!(!session.is_paused());
        assert!(!session.new_logs_available());
    }

    #[test]
    fn pause_includes_growth_awaiting_tick() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);
        let start = Instant::now();
        for t in [30, 10, 20] {
            session.deliver(ChannelKind::Service, RawLogRecord::new(t, "pending"), start);
        }

        session.pause();
        let at_pause = session.view().clone();
        assert_eq!(at_pause.len(), 3);
        assert!(session.next_deadline().is_none());
        assert!(!session.new_logs_available());

        let resumed = session.resume();
        assert_eq!(resumed, at_pause);
        assert_eq!(resumed.sequence_ids(), vec![SequenceId(2), SequenceId(3), SequenceId(1)]);
    }

    #[test]
    fn set_paused_round_trip() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);

        session.set_paused(true);
        assert!(session.snapshot().paused);
        session.set_paused(false);
        assert!(!session.snapshot().paused);
    }

    #[test]
    fn retarget_starts_over() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);
        let now = Instant::now();
        session.deliver(ChannelKind::Service, RawLogRecord::new(1, "old service").with_pod("a-1"), now);
        session.flush(now);
        session.rows();
        session.pause();

        let other = SubscriptionKey::new("org", "cluster", "project", "env", "other");
        assert!(session.retarget(Some(other.clone()), SessionWindow::new(0)));

        assert!(session.view().is_empty());
        assert!(!session.is_paused());
        assert!(session.colors().is_empty());
        assert_eq!(transport.subscriber_count(ChannelKind::Service, &key()), 0);
        assert_eq!(transport.subscriber_count(ChannelKind::Service, &other), 1);

        // Stale feed cannot reach the new buffers.
        assert_eq!(
            transport.publish(ChannelKind::Service, &key(), RawLogRecord::new(2, "stale")),
            0
        );
        transport.publish(ChannelKind::Service, &other, RawLogRecord::new(3, "fresh"));
        let view = session.flush(now);
        assert_eq!(messages(&view), vec!["fresh"]);
        assert_eq!(view.sequence_ids(), vec![SequenceId(1)]);

        assert!(!session.retarget(Some(other), SessionWindow::new(0)));
    }

    #[test]
    fn infra_toggle_resubscribes_with_fresh_buffer() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);
        let now = Instant::now();
        session.deliver(ChannelKind::Infra, RawLogRecord::new(1, "proxy"), now);

        assert!(session.set_infra_enabled(false));
        assert!(!session.channel(ChannelKind::Infra).is_active());
        assert_eq!(session.deliver(ChannelKind::Infra, RawLogRecord::new(2, "x"), now), None);

        assert!(session.set_infra_enabled(true));
        assert!(session.channel(ChannelKind::Infra).is_active());
        assert!(session.channel(ChannelKind::Infra).buffer().is_empty());
        assert!(!session.set_infra_enabled(true));
    }

    #[test]
    fn rows_follow_presented_view() {
        let transport = MemoryTransport::shared();
        let mut session = open(&transport, 0);
        let now = Instant::now();
        session.deliver(
            ChannelKind::Service,
            RawLogRecord::new(1_700_000_000_456, "ready").with_pod("api-6d4b9c-kx7zq"),
            now,
        );
        session.deliver(ChannelKind::Infra, RawLogRecord::new(1_700_000_000_000, "GET /"), now);
        session.flush(now);

        let rows = session.rows();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].channel, ChannelKind::Infra);
        assert!(rows[0].placeholder);
        assert_eq!(rows[1].time, "14 Nov, 22:13:20.45");
        assert_eq!(session.colors().len(), 1);
    }
}
