use crate::{
    buffer::{ChannelQueue, QueueEntry},
    candidate::Candidate,
    channel::ChannelPath,
    error::{Result, SyncError},
    message::Timestamp,
    types::SyncStats,
};
use indexmap::IndexMap;
use tracing::{debug, trace, warn};

/// The best candidate of the current search round and the round's
/// pivot.
#[derive(Debug, Clone)]
struct ActiveSearch {
    candidate: Candidate,
    /// Youngest member of the first candidate of the round.
    pivot: QueueEntry,
}

/// The internal state of the approximate time search.
///
/// Every channel owns a queue of pending messages plus a track-back
/// journal of the heads provisionally consumed during the current
/// round. For every channel `queue.len() + journal.len()` never exceeds
/// `max_queue_size` once [`SearchState::push`] returns.
#[derive(Debug)]
pub struct SearchState {
    queues: IndexMap<ChannelPath, ChannelQueue>,

    /// Channels that lost a message to overflow and may not seed a
    /// pivot. A flag lasts until a candidate is proposed whose youngest
    /// member comes from another channel.
    drop_flags: IndexMap<ChannelPath, bool>,

    active: Option<ActiveSearch>,

    max_queue_size: usize,

    published: u64,
    dropped: u64,
    discarded: u64,
}

impl SearchState {
    pub fn new<I>(channels: I, max_queue_size: usize) -> Self
    where
        I: IntoIterator<Item = ChannelPath>,
    {
        let mut queues = IndexMap::new();
        let mut drop_flags = IndexMap::new();
        for channel in channels {
            queues
                .entry(channel.clone())
                .or_insert_with(|| ChannelQueue::with_capacity(max_queue_size));
            drop_flags.insert(channel, false);
        }

        Self {
            queues,
            drop_flags,
            active: None,
            max_queue_size,
            published: 0,
            dropped: 0,
            discarded: 0,
        }
    }

    pub fn channels(&self) -> impl Iterator<Item = &ChannelPath> {
        self.queues.keys()
    }

    pub fn contains(&self, channel: &ChannelPath) -> bool {
        self.queues.contains_key(channel)
    }

    pub fn queue(&self, channel: &ChannelPath) -> Option<&ChannelQueue> {
        self.queues.get(channel)
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    pub fn is_dropped(&self, channel: &ChannelPath) -> bool {
        self.drop_flags.get(channel).copied().unwrap_or(false)
    }

    /// Spread of the best candidate of the running round, if any.
    pub fn active_spread(&self) -> Option<Timestamp> {
        self.active.as_ref().map(|search| search.candidate.spread())
    }

    /// The pivot of the running round, if any.
    pub fn pivot(&self) -> Option<&QueueEntry> {
        self.active.as_ref().map(|search| &search.pivot)
    }

    /// Checks if every channel has at least one pending message.
    pub fn all_filled(&self) -> bool {
        !self.queues.is_empty() && self.queues.values().all(|queue| !queue.is_empty())
    }

    /// Queues a message and runs the search. Returns the candidates
    /// that were accepted as bundles, oldest first.
    pub fn push(&mut self, channel: &ChannelPath, entry: QueueEntry) -> Result<Vec<Candidate>> {
        let Some(queue) = self.queues.get_mut(channel) else {
            return Err(SyncError::UnknownChannel {
                channel: channel.clone(),
            });
        };

        trace!(
            channel = %channel,
            timestamp = entry.timestamp,
            queued = queue.len(),
            journaled = queue.journal_len(),
            "queueing message"
        );
        queue.push_tail(entry);

        let mut accepted = Vec::new();
        self.search(&mut accepted);

        // The bound is enforced only after searching, otherwise the
        // message closest to the last bundle could be thrown away and
        // the emitted sets would no longer be contiguous.
        let total = self.queues[channel].total_len();
        if total > self.max_queue_size {
            self.handle_overflow(channel);
            self.search(&mut accepted);
        }

        Ok(accepted)
    }

    /// Runs the candidate search as long as every channel has a
    /// pending message.
    fn search(&mut self, accepted: &mut Vec<Candidate>) {
        while let Some(candidate) = Candidate::from_heads(&self.queues) {
            trace!(%candidate, "proposed candidate");
            self.clear_drop_flags(candidate.youngest().0);

            let active = match self.active.take() {
                None => {
                    let (youngest_channel, youngest) = candidate.youngest();

                    if self.is_dropped(youngest_channel) {
                        // A pivot from a channel that just dropped messages
                        // would skip over the dropped range.
                        let oldest_channel = candidate.oldest().0.clone();
                        debug!(
                            pivot_channel = %youngest_channel,
                            erased_channel = %oldest_channel,
                            "proposed pivot comes from a channel with dropped messages, ignoring candidate"
                        );
                        self.queues[&oldest_channel].pop_head();
                        self.discarded += 1;
                        continue;
                    }

                    let pivot = youngest.clone();
                    self.clear_journals();
                    ActiveSearch {
                        candidate: candidate.clone(),
                        pivot,
                    }
                }
                Some(active) if candidate.spread() < active.candidate.spread() => {
                    self.clear_journals();
                    ActiveSearch {
                        candidate: candidate.clone(),
                        pivot: active.pivot,
                    }
                }
                Some(active) => active,
            };

            debug!(
                pivot = active.pivot.timestamp,
                spread = active.candidate.spread(),
                "current best candidate"
            );

            // Shift the oldest head of the proposal into its journal.
            let (oldest_channel, oldest) = candidate.oldest();
            self.queues[oldest_channel].move_head_to_journal();

            if oldest.is_same(&active.pivot) {
                debug!("search exhausted at pivot");
                self.active = Some(active);
                accepted.extend(self.publish());
                continue;
            }

            // Every later candidate grows on the young side at least by
            // `youngest_interval` and shrinks on the old side at most by
            // `pivot_old_interval`.
            let youngest_interval = interval(
                candidate.youngest().1.timestamp,
                active.candidate.youngest().1.timestamp,
                "proposal youngest precedes active youngest",
            );
            let pivot_old_interval = interval(
                active.pivot.timestamp,
                active.candidate.oldest().1.timestamp,
                "pivot precedes active oldest",
            );
            trace!(youngest_interval, pivot_old_interval, "optimality check");

            self.active = Some(active);
            if youngest_interval >= pivot_old_interval {
                debug!("provably optimal candidate before exhausting the search");
                accepted.extend(self.publish());
            }
        }
    }

    /// Accepts the active candidate: undoes the provisional head
    /// removals of the round and consumes the candidate's members.
    fn publish(&mut self) -> Option<Candidate> {
        let search = self.active.take()?;
        self.restore_journals();

        for (channel, queue) in self.queues.iter_mut() {
            let head = queue.pop_head();
            debug_assert!(
                matches!((&head, search.candidate.get(channel)), (Some(head), Some(member)) if head.is_same(member)),
                "queue head of {channel} is not the accepted member"
            );
        }

        self.published += 1;
        debug!(
            bundle = self.published,
            spread = search.candidate.spread(),
            "accepted candidate"
        );
        Some(search.candidate)
    }

    /// Drops the oldest message of an over-full channel and invalidates
    /// the running round.
    fn handle_overflow(&mut self, channel: &ChannelPath) {
        self.restore_journals();
        self.active = None;

        let queue = &mut self.queues[channel];
        if let Some(entry) = queue.pop_head() {
            warn!(
                channel = %channel,
                timestamp = entry.timestamp,
                max_queue_size = self.max_queue_size,
                "queue is full, dropping oldest message"
            );
            self.dropped += 1;
        }
        debug_assert_eq!(queue.total_len(), self.max_queue_size);

        self.drop_flags.insert(channel.clone(), true);
    }

    /// Restores every track-back journal to the front of its queue.
    /// Calling this twice in a row is a no-op the second time.
    pub fn restore_journals(&mut self) {
        self.queues
            .values_mut()
            .for_each(ChannelQueue::restore_journal_to_head);
    }

    fn clear_journals(&mut self) {
        let cleared: usize = self
            .queues
            .values_mut()
            .map(ChannelQueue::clear_journal)
            .sum();
        if cleared > 0 {
            trace!(cleared, "cleared track-back journals");
        }
    }

    /// Resets the drop flags of all channels except `keep`.
    fn clear_drop_flags(&mut self, keep: &ChannelPath) {
        for (channel, flag) in self.drop_flags.iter_mut() {
            if channel != keep && *flag {
                trace!(channel = %channel, "drop flag cleared");
                *flag = false;
            }
        }
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            published: self.published,
            dropped: self.dropped,
            discarded: self.discarded,
            depths: self
                .queues
                .iter()
                .map(|(channel, queue)| (channel.clone(), queue.total_len()))
                .collect(),
            drop_flagged: self
                .drop_flags
                .iter()
                .filter(|&(_, &flag)| flag)
                .map(|(channel, _)| channel.clone())
                .collect(),
        }
    }
}

fn interval(later: Timestamp, earlier: Timestamp, what: &str) -> Timestamp {
    assert!(
        later >= earlier,
        "search invariant violated: {what} ({later} < {earlier})"
    );
    later - earlier
}
