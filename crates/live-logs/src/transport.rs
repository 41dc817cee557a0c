//! The seam between the pipeline and whatever delivers log records.
//!
//! This module provides:
//! - [`LogTransport`]: Trait for subscribing a channel to a record feed
//! - [`Subscription`]: The receiving end of one activation
//! - [`MemoryTransport`]: In-process transport used by tests and replay tools

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::channel::SubscriptionKey;
use crate::error::{LiveLogsError, Result};
use crate::types::{ChannelKind, RawLogRecord};

/// Trait for record delivery backends.
///
/// Implementors turn a channel kind and subscription key into a live feed of
/// already-parsed records. Connection management, authentication and
/// reconnection are the implementor's business.
pub trait LogTransport: Send + Sync {
    /// Opens a feed for one channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be established.
    fn subscribe(&self, kind: ChannelKind, key: &SubscriptionKey) -> Result<Subscription>;
}

/// Shared transport handle.
pub type SharedTransport = Arc<dyn LogTransport>;

/// Receiving end of one channel activation.
///
/// Dropping a subscription is what deactivates it: the transport side can no
/// longer deliver into it, so nothing from an old activation can reach a
/// buffer created for a new one.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<RawLogRecord>,
}

/// Outcome of a non-blocking receive.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery {
    /// A record was waiting.
    Record(RawLogRecord),
    /// Nothing is waiting right now.
    Empty,
    /// The transport side has gone away.
    Closed,
}

impl Subscription {
    /// Wraps a receiver.
    #[must_use]
    pub const fn new(receiver: mpsc::UnboundedReceiver<RawLogRecord>) -> Self {
        Self { receiver }
    }

    /// Creates a connected sender/subscription pair.
    #[must_use]
    pub fn pair() -> (mpsc::UnboundedSender<RawLogRecord>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self::new(receiver))
    }

    /// Waits for the next record. Returns `None` once the transport side is gone.
    pub async fn recv(&mut self) -> Option<RawLogRecord> {
        self.receiver.recv().await
    }

    /// Takes a waiting record without blocking.
    pub fn try_recv(&mut self) -> Delivery {
        match self.receiver.try_recv() {
            Ok(record) => Delivery::Record(record),
            Err(TryRecvError::Empty) => Delivery::Empty,
            Err(TryRecvError::Disconnected) => Delivery::Closed,
        }
    }
}

type FeedKey = (ChannelKind, SubscriptionKey);

/// In-process transport backed by unbounded channels.
///
/// Records are pushed with [`MemoryTransport::publish`] and fan out to every
/// live subscription for the same channel kind and key.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    feeds: Mutex<HashMap<FeedKey, Vec<mpsc::UnboundedSender<RawLogRecord>>>>,
    unavailable: Mutex<HashSet<ChannelKind>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shared transport.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Delivers a record to every live subscriber of the feed.
    ///
    /// Returns how many subscribers received it. Subscribers that have been
    /// dropped are pruned.
    pub fn publish(&self, kind: ChannelKind, key: &SubscriptionKey, record: RawLogRecord) -> usize {
        let mut feeds = self.feeds.lock();
        let Some(senders) = feeds.get_mut(&(kind, key.clone())) else {
            return 0;
        };

        senders.retain(|sender| sender.send(record.clone()).is_ok());
        let delivered = senders.len();
        if delivered == 0 {
            feeds.remove(&(kind, key.clone()));
        }
        delivered
    }

    /// Number of feeds with at least one subscriber on record.
    #[must_use]
    pub fn feed_count(&self) -> usize {
        self.feeds.lock().len()
    }

    /// Number of live subscribers of a feed.
    #[must_use]
    pub fn subscriber_count(&self, kind: ChannelKind, key: &SubscriptionKey) -> usize {
        self.feeds
            .lock()
            .get(&(kind, key.clone()))
            .map_or(0, |senders| senders.iter().filter(|s| !s.is_closed()).count())
    }

    /// Ends a feed from the transport side.
    pub fn close(&self, kind: ChannelKind, key: &SubscriptionKey) {
        self.feeds.lock().remove(&(kind, key.clone()));
    }

    /// Makes future subscriptions for a channel kind fail (or succeed again).
    pub fn set_unavailable(&self, kind: ChannelKind, unavailable: bool) {
        let mut set = self.unavailable.lock();
        if unavailable {
            set.insert(kind);
        } else {
            set.remove(&kind);
        }
    }
}

impl LogTransport for MemoryTransport {
    fn subscribe(&self, kind: ChannelKind, key: &SubscriptionKey) -> Result<Subscription> {
        if self.unavailable.lock().contains(&kind) {
            return Err(LiveLogsError::Subscribe {
                kind,
                reason: "transport unavailable".to_string(),
            });
        }

        let (sender, subscription) = Subscription::pair();
        let mut feeds = self.feeds.lock();
        // Drop feeds whose subscriptions are all gone, e.g. after a retarget.
        feeds.retain(|_, senders| {
            senders.retain(|sender| !sender.is_closed());
            !senders.is_empty()
        });
        feeds.entry((kind, key.clone())).or_default().push(sender);
        Ok(subscription)
    }
}
