use crate::message::{MessageRef, Timestamp};
use std::{collections::VecDeque, sync::Arc};

/// A queued message together with the timestamp it is synchronized on.
///
/// The timestamp is resolved once when the message is queued, so the
/// search never has to consult the selector again.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub timestamp: Timestamp,
    pub message: MessageRef,
}

impl QueueEntry {
    pub fn new(timestamp: Timestamp, message: MessageRef) -> Self {
        Self { timestamp, message }
    }

    /// Identity comparison: both entries refer to the same message.
    pub fn is_same(&self, other: &QueueEntry) -> bool {
        Arc::ptr_eq(&self.message, &other.message)
    }
}

/// The pending messages of one channel.
///
/// New messages are appended at the tail. During a search round, heads
/// are provisionally moved into a track-back journal so that the round
/// can be undone by restoring the journal to the front of the queue.
#[derive(Debug)]
pub struct ChannelQueue {
    queue: VecDeque<QueueEntry>,
    journal: VecDeque<QueueEntry>,
}

impl ChannelQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity + 1),
            journal: VecDeque::with_capacity(capacity),
        }
    }

    /// Number of messages waiting in the queue, excluding the journal.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Number of messages held by this channel, journal included.
    pub fn total_len(&self) -> usize {
        self.queue.len() + self.journal.len()
    }

    pub fn front(&self) -> Option<&QueueEntry> {
        self.queue.front()
    }

    pub fn back(&self) -> Option<&QueueEntry> {
        self.queue.back()
    }

    pub fn push_tail(&mut self, entry: QueueEntry) {
        self.queue.push_back(entry);
    }

    /// Removes the head permanently without journaling it.
    pub fn pop_head(&mut self) -> Option<QueueEntry> {
        self.queue.pop_front()
    }

    /// Moves the head into the journal. Returns false if the queue is
    /// empty.
    pub fn move_head_to_journal(&mut self) -> bool {
        let Some(entry) = self.queue.pop_front() else {
            return false;
        };
        self.journal.push_back(entry);
        true
    }

    /// Puts every journaled message back in front of the queue,
    /// restoring the order they were removed in.
    pub fn restore_journal_to_head(&mut self) {
        while let Some(entry) = self.journal.pop_back() {
            self.queue.push_front(entry);
        }
    }

    /// Forgets the journaled messages for good.
    pub fn clear_journal(&mut self) -> usize {
        let count = self.journal.len();
        self.journal.clear();
        count
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.queue.iter()
    }

    pub fn journal(&self) -> impl Iterator<Item = &QueueEntry> {
        self.journal.iter()
    }
}
