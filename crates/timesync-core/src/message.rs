//! The immutable message model shared by all strategies.

use crate::channel::ChannelPath;
use chrono::Utc;
use indexmap::IndexMap;
use std::{collections::BTreeSet, fmt, sync::Arc};
use uuid::Uuid;

/// Logical timestamp in microseconds.
pub type Timestamp = u64;

/// Names of the system timestamps every message carries.
pub mod names {
    pub const CREATE: &str = "rsb::create";
    pub const SEND: &str = "rsb::send";
    pub const RECEIVE: &str = "rsb::receive";
    pub const DELIVER: &str = "rsb::deliver";

    pub const ALL: [&str; 4] = [CREATE, SEND, RECEIVE, DELIVER];
}

/// Unique identifier of a message: the originating participant and a
/// sequence number within that participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId {
    pub origin: Uuid,
    pub sequence: u64,
}

impl MessageId {
    pub fn new(origin: Uuid, sequence: u64) -> Self {
        Self { origin, sequence }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.sequence)
    }
}

/// The named timestamps attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub create: Timestamp,
    pub send: Timestamp,
    pub receive: Timestamp,
    pub deliver: Timestamp,
    pub user: IndexMap<String, Timestamp>,
}

impl Timestamps {
    /// Looks up a timestamp by name, system names first.
    pub fn get(&self, name: &str) -> Option<Timestamp> {
        match name {
            names::CREATE => Some(self.create),
            names::SEND => Some(self.send),
            names::RECEIVE => Some(self.receive),
            names::DELIVER => Some(self.deliver),
            _ => self.user.get(name).copied(),
        }
    }

    pub fn user(&self, name: &str) -> Option<Timestamp> {
        self.user.get(name).copied()
    }
}

/// A message delivered on one channel.
///
/// Messages are immutable once built and are shared between queues,
/// candidates and published bundles through [`MessageRef`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    channel: ChannelPath,
    timestamps: Timestamps,
    payload: Arc<[u8]>,
    causes: BTreeSet<MessageId>,
}

/// Shared handle to an immutable message.
pub type MessageRef = Arc<Message>;

impl Message {
    pub fn builder(id: MessageId, channel: ChannelPath) -> MessageBuilder {
        MessageBuilder::new(id, channel)
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn channel(&self) -> &ChannelPath {
        &self.channel
    }

    pub fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn causes(&self) -> &BTreeSet<MessageId> {
        &self.causes
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message[id = {}, channel = {}, create = {}]",
            self.id, self.channel, self.timestamps.create
        )
    }
}

/// Builder for [`Message`].
///
/// When no create timestamp is given, the current wall clock time in
/// microseconds is used. Send, receive and deliver default to the
/// create timestamp.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    id: MessageId,
    channel: ChannelPath,
    create: Option<Timestamp>,
    send: Option<Timestamp>,
    receive: Option<Timestamp>,
    deliver: Option<Timestamp>,
    user: IndexMap<String, Timestamp>,
    payload: Arc<[u8]>,
    causes: BTreeSet<MessageId>,
}

impl MessageBuilder {
    pub fn new(id: MessageId, channel: ChannelPath) -> Self {
        Self {
            id,
            channel,
            create: None,
            send: None,
            receive: None,
            deliver: None,
            user: IndexMap::new(),
            payload: Arc::from(Vec::new()),
            causes: BTreeSet::new(),
        }
    }

    pub fn create_time(mut self, ts: Timestamp) -> Self {
        self.create = Some(ts);
        self
    }

    pub fn send_time(mut self, ts: Timestamp) -> Self {
        self.send = Some(ts);
        self
    }

    pub fn receive_time(mut self, ts: Timestamp) -> Self {
        self.receive = Some(ts);
        self
    }

    pub fn deliver_time(mut self, ts: Timestamp) -> Self {
        self.deliver = Some(ts);
        self
    }

    pub fn user_time(mut self, name: impl Into<String>, ts: Timestamp) -> Self {
        self.user.insert(name.into(), ts);
        self
    }

    pub fn payload(mut self, payload: impl Into<Arc<[u8]>>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn cause(mut self, id: MessageId) -> Self {
        self.causes.insert(id);
        self
    }

    pub fn build(self) -> Message {
        let create = self.create.unwrap_or_else(now_micros);
        Message {
            id: self.id,
            channel: self.channel,
            timestamps: Timestamps {
                create,
                send: self.send.unwrap_or(create),
                receive: self.receive.unwrap_or(create),
                deliver: self.deliver.unwrap_or(create),
                user: self.user,
            },
            payload: self.payload,
            causes: self.causes,
        }
    }

    pub fn build_ref(self) -> MessageRef {
        Arc::new(self.build())
    }
}

/// Current wall clock time in microseconds since the Unix epoch.
pub fn now_micros() -> Timestamp {
    Utc::now().timestamp_micros().max(0) as Timestamp
}
