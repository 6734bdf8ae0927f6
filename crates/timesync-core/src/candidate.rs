use crate::{
    buffer::{ChannelQueue, QueueEntry},
    channel::ChannelPath,
    message::Timestamp,
};
use indexmap::IndexMap;
use std::fmt;

/// A hypothesized bundle built from the heads of all channel queues.
///
/// On equal timestamps the channel that comes first in configuration
/// order (primary first) is reported as youngest and as oldest, not the
/// one with the smallest channel path.
#[derive(Debug, Clone)]
pub struct Candidate {
    members: IndexMap<ChannelPath, QueueEntry>,
    youngest: usize,
    oldest: usize,
}

impl Candidate {
    /// Builds a candidate from the current queue heads. Returns `None`
    /// if any queue is empty or there are no queues at all.
    pub fn from_heads(queues: &IndexMap<ChannelPath, ChannelQueue>) -> Option<Self> {
        let members: IndexMap<_, _> = queues
            .iter()
            .map(|(channel, queue)| Some((channel.clone(), queue.front()?.clone())))
            .collect::<Option<_>>()?;
        Self::from_members(members)
    }

    pub fn from_members(members: IndexMap<ChannelPath, QueueEntry>) -> Option<Self> {
        let mut youngest = 0;
        let mut oldest = 0;
        for (index, (_, entry)) in members.iter().enumerate().skip(1) {
            if entry.timestamp > members[youngest].timestamp {
                youngest = index;
            }
            if entry.timestamp < members[oldest].timestamp {
                oldest = index;
            }
        }

        if members.is_empty() {
            return None;
        }

        Some(Self {
            members,
            youngest,
            oldest,
        })
    }

    /// The member with the largest timestamp.
    pub fn youngest(&self) -> (&ChannelPath, &QueueEntry) {
        self.member(self.youngest)
    }

    /// The member with the smallest timestamp.
    pub fn oldest(&self) -> (&ChannelPath, &QueueEntry) {
        self.member(self.oldest)
    }

    /// Timestamp range covered by the members.
    pub fn spread(&self) -> Timestamp {
        self.youngest().1.timestamp - self.oldest().1.timestamp
    }

    pub fn get(&self, channel: &ChannelPath) -> Option<&QueueEntry> {
        self.members.get(channel)
    }

    pub fn members(&self) -> impl Iterator<Item = (&ChannelPath, &QueueEntry)> {
        self.members.iter()
    }

    pub fn into_members(self) -> IndexMap<ChannelPath, QueueEntry> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn member(&self, index: usize) -> (&ChannelPath, &QueueEntry) {
        let (channel, entry) = self
            .members
            .get_index(index)
            .unwrap_or_else(|| unreachable!("candidate index {index} out of range"));
        (channel, entry)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Candidate[spread = {}", self.spread())?;
        for (channel, entry) in &self.members {
            write!(f, ", {channel} @ {}", entry.timestamp)?;
        }
        write!(f, "]")
    }
}
