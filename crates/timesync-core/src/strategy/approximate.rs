use super::{SyncStrategy, Wiring, collect_channels};
use crate::{
    buffer::QueueEntry,
    candidate::Candidate,
    channel::ChannelPath,
    config::Config,
    error::{Result, SyncError},
    message::MessageRef,
    selector::SelectorRef,
    state::SearchState,
    types::{SyncDataHandler, SyncStats},
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Groups one message per channel such that the timestamp spread of
/// each group is minimal, consuming the messages of every channel in
/// order.
pub struct ApproximateTimeStrategy {
    max_queue_size: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: Option<SearchState>,
    wiring: Wiring,
}

impl ApproximateTimeStrategy {
    pub const KEY: &'static str = "approxt";

    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_max_queue_size(config.max_queue_size))
    }

    pub fn with_max_queue_size(max_queue_size: usize) -> Self {
        assert!(max_queue_size > 0, "max_queue_size must be positive");
        Self {
            max_queue_size,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }
}

impl SyncStrategy for ApproximateTimeStrategy {
    fn key(&self) -> &'static str {
        Self::KEY
    }

    fn initialize_channels(
        &self,
        primary: ChannelPath,
        subsidiaries: &[ChannelPath],
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state.is_some() {
            return Err(SyncError::AlreadyInitialized);
        }

        let channels = collect_channels(primary, subsidiaries)?;
        info!(
            channels = ?channels,
            max_queue_size = self.max_queue_size,
            "initialized approximate time synchronization"
        );
        inner.state = Some(SearchState::new(channels, self.max_queue_size));
        Ok(())
    }

    fn set_sync_data_handler(&self, handler: Arc<dyn SyncDataHandler>) {
        self.inner.lock().wiring.set_handler(handler);
    }

    fn set_timestamp_selector(&self, selector: SelectorRef) {
        self.inner.lock().wiring.set_selector(selector);
    }

    fn handle(&self, message: MessageRef) -> Result<()> {
        let mut guard = self.inner.lock();
        let Inner { state, wiring } = &mut *guard;

        let state = state.as_mut().ok_or(SyncError::NotInitialized { what: "channels" })?;
        let channel = message.channel().clone();
        if !state.contains(&channel) {
            return Err(SyncError::UnknownChannel { channel });
        }
        let handler = wiring.handler()?;
        let timestamp = wiring.selector().timestamp(&message)?;

        debug!(channel = %channel, timestamp, id = %message.id(), "received message");
        let accepted = state.push(&channel, QueueEntry::new(timestamp, message))?;

        for candidate in accepted {
            publish(handler.as_ref(), candidate);
        }
        Ok(())
    }

    fn stats(&self) -> SyncStats {
        self.inner
            .lock()
            .state
            .as_ref()
            .map(SearchState::stats)
            .unwrap_or_default()
    }
}

fn publish(handler: &dyn SyncDataHandler, candidate: Candidate) {
    let spread = candidate.spread();
    let mut event = handler.create_event();
    for (_, entry) in candidate.into_members() {
        event.push(entry.message);
    }
    info!(id = %event.id, members = event.len(), spread, "publishing synchronized bundle");
    handler.handle(event);
}
