use super::{SyncStrategy, Wiring, collect_channels, is_on_channel};
use crate::{
    channel::ChannelPath,
    config::Config,
    error::{Result, SyncError},
    message::{MessageRef, Timestamp, now_micros},
    scheduler::Scheduler,
    selector::SelectorRef,
    types::{SyncDataHandler, SyncStats},
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tracing::{debug, info, trace, warn};

/// Groups every primary message with the subsidiary messages whose
/// timestamps lie within a time frame around it.
///
/// A primary message is evaluated once its timestamp plus the buffer
/// time has passed on the wall clock, so that late subsidiary messages
/// can still be associated. Subsidiary messages older than the buffer
/// time are evicted periodically.
pub struct TimeFrameStrategy {
    time_frame: Timestamp,
    buffer_time: Timestamp,
    shared: Arc<Mutex<Inner>>,
    scheduler: Scheduler,
}

#[derive(Default)]
struct Inner {
    channels: Option<Channels>,
    wiring: Wiring,
    /// Subsidiary messages indexed by their selected timestamp.
    buffer: BTreeMap<Timestamp, Vec<Buffered>>,
    published: u64,
    evicted: u64,
}

struct Channels {
    primary: ChannelPath,
    subsidiaries: Vec<ChannelPath>,
}

impl Channels {
    /// Resolves the configured subsidiary channel a message belongs to.
    fn subsidiary(&self, actual: &ChannelPath) -> Option<&ChannelPath> {
        self.subsidiaries
            .iter()
            .filter(|channel| is_on_channel(actual, channel))
            .max_by_key(|channel| channel.components().len())
    }
}

struct Buffered {
    channel: ChannelPath,
    message: MessageRef,
}

impl TimeFrameStrategy {
    pub const KEY: &'static str = "timeframe";

    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let time_frame = duration_micros(config.time_frame);
        let buffer_time = duration_micros(config.buffer_time);
        let shared = Arc::new(Mutex::new(Inner::default()));

        let scheduler = {
            let shared = shared.clone();
            Scheduler::with_periodic(
                "timeframe-scheduler",
                config.sweep_interval(),
                Box::new(move || {
                    let cutoff = now_micros().saturating_sub(buffer_time);
                    sweep(&mut shared.lock(), cutoff);
                }),
            )?
        };

        info!(
            time_frame_us = time_frame,
            buffer_time_us = buffer_time,
            sweep_interval = ?config.sweep_interval(),
            "configured time frame synchronization"
        );

        Ok(Self {
            time_frame,
            buffer_time,
            shared,
            scheduler,
        })
    }

    /// Evicts every buffered subsidiary message with a timestamp older
    /// than `cutoff`. Returns the number of evicted messages.
    pub fn sweep_older_than(&self, cutoff: Timestamp) -> usize {
        sweep(&mut self.shared.lock(), cutoff)
    }

    /// Number of primary messages waiting for evaluation.
    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }
}

impl SyncStrategy for TimeFrameStrategy {
    fn key(&self) -> &'static str {
        Self::KEY
    }

    fn initialize_channels(
        &self,
        primary: ChannelPath,
        subsidiaries: &[ChannelPath],
    ) -> Result<()> {
        let mut inner = self.shared.lock();
        if inner.channels.is_some() {
            return Err(SyncError::AlreadyInitialized);
        }

        let mut channels = collect_channels(primary, subsidiaries)?.into_iter();
        let Some(primary) = channels.next() else {
            return Err(SyncError::InvalidConfig("no primary channel".to_string()));
        };
        info!(primary = %primary, "initialized time frame synchronization");
        inner.channels = Some(Channels {
            primary,
            subsidiaries: channels.collect(),
        });
        Ok(())
    }

    fn set_sync_data_handler(&self, handler: Arc<dyn SyncDataHandler>) {
        self.shared.lock().wiring.set_handler(handler);
    }

    fn set_timestamp_selector(&self, selector: SelectorRef) {
        self.shared.lock().wiring.set_selector(selector);
    }

    fn handle(&self, message: MessageRef) -> Result<()> {
        let mut guard = self.shared.lock();
        let inner = &mut *guard;

        let channels = inner
            .channels
            .as_ref()
            .ok_or(SyncError::NotInitialized { what: "channels" })?;
        inner.wiring.handler()?;

        if is_on_channel(message.channel(), &channels.primary) {
            let timestamp = inner.wiring.selector().timestamp(&message)?;
            let delay = timestamp
                .saturating_add(self.buffer_time)
                .saturating_sub(now_micros());
            debug!(
                channel = %message.channel(),
                timestamp,
                delay_us = delay,
                "scheduling primary message"
            );

            let shared = self.shared.clone();
            let time_frame = self.time_frame;
            return self.scheduler.schedule_after(
                Duration::from_micros(delay),
                Box::new(move || emit_frame(&mut shared.lock(), message, timestamp, time_frame)),
            );
        }

        let Some(channel) = channels.subsidiary(message.channel()).cloned() else {
            return Err(SyncError::UnknownChannel {
                channel: message.channel().clone(),
            });
        };
        let timestamp = inner.wiring.selector().timestamp(&message)?;
        trace!(channel = %channel, timestamp, "buffered subsidiary message");
        inner
            .buffer
            .entry(timestamp)
            .or_default()
            .push(Buffered { channel, message });
        Ok(())
    }

    fn stats(&self) -> SyncStats {
        let inner = self.shared.lock();
        let mut depths = IndexMap::new();
        if let Some(channels) = &inner.channels {
            depths.insert(channels.primary.clone(), self.scheduler.pending());
            for channel in &channels.subsidiaries {
                depths.insert(channel.clone(), 0);
            }
        }
        for buffered in inner.buffer.values().flatten() {
            *depths.entry(buffered.channel.clone()).or_insert(0) += 1;
        }

        SyncStats {
            published: inner.published,
            dropped: inner.evicted,
            depths,
            ..SyncStats::default()
        }
    }

    fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

/// Publishes a primary message together with its buffered subsidiary
/// messages.
fn emit_frame(inner: &mut Inner, primary: MessageRef, timestamp: Timestamp, time_frame: Timestamp) {
    let handler = match inner.wiring.handler() {
        Ok(handler) => handler,
        Err(err) => {
            warn!(id = %primary.id(), "dropping time frame: {err}");
            return;
        }
    };

    let lower = timestamp.saturating_sub(time_frame);
    let upper = timestamp.saturating_add(time_frame);

    let mut event = handler.create_event();
    event.push(primary);
    for buffered in inner.buffer.range(lower..=upper).flat_map(|(_, entries)| entries) {
        event.push(buffered.message.clone());
    }

    inner.published += 1;
    debug!(
        id = %event.id,
        timestamp,
        members = event.len(),
        "publishing time frame bundle"
    );
    handler.handle(event);
}

fn sweep(inner: &mut Inner, cutoff: Timestamp) -> usize {
    let kept = inner.buffer.split_off(&cutoff);
    let evicted: usize = std::mem::replace(&mut inner.buffer, kept)
        .values()
        .map(Vec::len)
        .sum();

    if evicted > 0 {
        inner.evicted += evicted as u64;
        debug!(evicted, cutoff, "evicted stale subsidiary messages");
    }
    evicted
}

fn duration_micros(duration: Duration) -> Timestamp {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
