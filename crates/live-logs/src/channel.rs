//! One logical log subscription and the buffer it feeds.
//!
//! A [`LogChannel`] is active only when every identifier of its
//! [`SubscriptionKey`] is present and the channel is enabled. Changing the key
//! or the enabling toggle tears the old subscription down and starts over with
//! a fresh [`ChannelBuffer`], so an old activation can never write into a
//! buffer that belongs to a new one.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::ChannelBuffer;
use crate::transport::{Delivery, LogTransport, Subscription};
use crate::types::{ChannelKind, RawLogRecord, SequencedRecord};

/// Identity of a log subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    /// Organization identifier
    pub organization_id: String,
    /// Cluster identifier
    pub cluster_id: String,
    /// Project identifier
    pub project_id: String,
    /// Environment identifier
    pub environment_id: String,
    /// Service identifier
    pub service_id: String,
    /// Optional component type, e.g. `ingress`
    #[serde(default)]
    pub component: Option<String>,
}

impl SubscriptionKey {
    /// Creates a key without a component type.
    #[must_use]
    pub fn new(
        organization_id: impl Into<String>,
        cluster_id: impl Into<String>,
        project_id: impl Into<String>,
        environment_id: impl Into<String>,
        service_id: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            cluster_id: cluster_id.into(),
            project_id: project_id.into(),
            environment_id: environment_id.into(),
            service_id: service_id.into(),
            component: None,
        }
    }

    /// Adds a component type.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Returns true if every required identifier is non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [
            &self.organization_id,
            &self.cluster_id,
            &self.project_id,
            &self.environment_id,
            &self.service_id,
        ]
        .iter()
        .all(|id| !id.trim().is_empty())
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.organization_id,
            self.cluster_id,
            self.project_id,
            self.environment_id,
            self.service_id
        )?;
        if let Some(component) = &self.component {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

/// Why a channel is not receiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InactiveReason {
    /// No key, or a key with an empty identifier
    MissingIdentifiers,
    /// The channel's feature toggle is off
    Disabled,
    /// The transport refused the subscription
    SubscribeFailed,
    /// The transport ended the feed
    TransportClosed,
    /// Torn down by the owner
    Deactivated,
}

/// Activation state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Subscribed and receiving
    Active,
    /// Not receiving; a legitimate no-op state, not an error
    Inactive(InactiveReason),
}

/// A single logical subscription (service or infra) and its buffer.
#[derive(Debug)]
pub struct LogChannel {
    kind: ChannelKind,
    key: Option<SubscriptionKey>,
    enabled: bool,
    subscription: Option<Subscription>,
    buffer: ChannelBuffer,
    state: ChannelState,
    activations: u64,
}

impl LogChannel {
    /// Creates an inactive channel with an empty buffer.
    #[must_use]
    pub const fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            key: None,
            enabled: false,
            subscription: None,
            buffer: ChannelBuffer::new(kind),
            state: ChannelState::Inactive(InactiveReason::MissingIdentifiers),
            activations: 0,
        }
    }

    /// Points the channel at a key and enabling toggle.
    ///
    /// When either differs from the current configuration the old
    /// subscription is dropped, the buffer is replaced by an empty one and a
    /// new subscription is attempted. Returns true if that happened; an
    /// unchanged configuration is a no-op.
    pub fn activate(
        &mut self,
        key: Option<SubscriptionKey>,
        enabled: bool,
        transport: &dyn LogTransport,
    ) -> bool {
        if self.activations > 0 && self.key == key && self.enabled == enabled {
            return false;
        }

        self.deactivate();
        self.buffer = ChannelBuffer::new(self.kind);
        self.key = key;
        self.enabled = enabled;
        self.activations += 1;
        self.subscribe(transport);
        true
    }

    fn subscribe(&mut self, transport: &dyn LogTransport) {
        if !self.enabled {
            self.state = ChannelState::Inactive(InactiveReason::Disabled);
            return;
        }
        let Some(key) = self.key.as_ref().filter(|k| k.is_complete()) else {
            self.state = ChannelState::Inactive(InactiveReason::MissingIdentifiers);
            return;
        };

        match transport.subscribe(self.kind, key) {
            Ok(subscription) => {
                debug!(channel = %self.kind, key = %key, "channel activated");
                self.subscription = Some(subscription);
                self.state = ChannelState::Active;
            }
            Err(e) => {
                warn!(channel = %self.kind, key = %key, error = %e, "channel subscription failed");
                self.state = ChannelState::Inactive(InactiveReason::SubscribeFailed);
            }
        }
    }

    /// Drops the current subscription. Buffered records are kept.
    pub fn deactivate(&mut self) {
        if self.subscription.take().is_some() {
            debug!(channel = %self.kind, buffered = self.buffer.len(), "channel deactivated");
            self.state = ChannelState::Inactive(InactiveReason::Deactivated);
        }
    }

    fn mark_closed(&mut self) {
        self.subscription = None;
        self.state = ChannelState::Inactive(InactiveReason::TransportClosed);
        debug!(channel = %self.kind, buffered = self.buffer.len(), "channel feed closed");
    }

    /// Waits for the next delivery.
    ///
    /// Pends forever while the channel is inactive, which makes it safe to
    /// race against other event sources. A feed closed by the transport turns
    /// the channel inactive and keeps what was buffered.
    pub async fn recv(&mut self) -> RawLogRecord {
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return std::future::pending().await;
            };
            match subscription.recv().await {
                Some(record) => return record,
                None => self.mark_closed(),
            }
        }
    }

    /// Takes every delivery already waiting, without blocking.
    pub fn drain(&mut self) -> Vec<RawLogRecord> {
        let mut drained = Vec::new();
        while let Some(subscription) = self.subscription.as_mut() {
            match subscription.try_recv() {
                Delivery::Record(record) => drained.push(record),
                Delivery::Empty => break,
                Delivery::Closed => self.mark_closed(),
            }
        }
        drained
    }

    /// Appends a stamped record to this channel's buffer.
    pub fn append(&mut self, record: SequencedRecord) {
        self.buffer.append(record);
    }

    /// Channel kind.
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Current subscription key.
    #[must_use]
    pub const fn key(&self) -> Option<&SubscriptionKey> {
        self.key.as_ref()
    }

    /// Whether the enabling toggle is on.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the channel is currently subscribed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, ChannelState::Active)
    }

    /// Current activation state.
    #[must_use]
    pub const fn state(&self) -> ChannelState {
        self.state
    }

    /// Records received since the last (re)activation.
    #[must_use]
    pub const fn buffer(&self) -> &ChannelBuffer {
        &self.buffer
    }

    /// How many times the channel has been (re)configured.
    #[must_use]
    pub const fn activations(&self) -> u64 {
        self.activations
    }
}
