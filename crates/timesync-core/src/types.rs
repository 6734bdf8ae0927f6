use crate::{
    channel::ChannelPath,
    message::{MessageId, MessageRef, Timestamp},
};
use indexmap::{IndexMap, IndexSet};
use uuid::Uuid;

/// Synchronized messages grouped by the channel they arrived on.
pub type EventsByChannel = IndexMap<ChannelPath, Vec<MessageRef>>;

/// The output envelope carrying one synchronized bundle.
///
/// Envelopes are created empty by [`SyncDataHandler::create_event`],
/// filled by a strategy and handed back to [`SyncDataHandler::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub id: Uuid,
    /// Channel the bundle is published on, if the handler assigns one.
    pub channel: Option<ChannelPath>,
    pub events: EventsByChannel,
    pub causes: IndexSet<MessageId>,
    pub user_times: IndexMap<String, Timestamp>,
}

impl SyncEvent {
    pub fn new(channel: Option<ChannelPath>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            events: IndexMap::new(),
            causes: IndexSet::new(),
            user_times: IndexMap::new(),
        }
    }

    /// Adds a member message and records it as a cause.
    pub fn push(&mut self, message: MessageRef) {
        self.causes.insert(message.id());
        self.events
            .entry(message.channel().clone())
            .or_default()
            .push(message);
    }

    /// Returns the first message stored for a channel.
    pub fn first(&self, channel: &ChannelPath) -> Option<&MessageRef> {
        self.events.get(channel)?.first()
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageRef> {
        self.events.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Receives synchronized bundles from a strategy.
///
/// `handle` is called while the strategy holds its internal lock, so
/// implementations must not block indefinitely.
pub trait SyncDataHandler: Send + Sync {
    /// Creates an empty envelope for the next bundle.
    fn create_event(&self) -> SyncEvent {
        SyncEvent::new(None)
    }

    /// Publishes a finished bundle.
    fn handle(&self, event: SyncEvent);
}

/// Counters and queue depths reported by a strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Number of bundles handed to the handler.
    pub published: u64,

    /// Number of messages discarded to bound memory, by queue overflow
    /// or by eviction of stale messages.
    pub dropped: u64,

    /// Number of queue heads erased because they could not seed a
    /// valid pivot.
    pub discarded: u64,

    /// Pending messages per channel. For the approximate time strategy
    /// this includes the track-back journal.
    pub depths: IndexMap<ChannelPath, usize>,

    /// Channels whose drop flag is currently set.
    pub drop_flagged: Vec<ChannelPath>,
}
