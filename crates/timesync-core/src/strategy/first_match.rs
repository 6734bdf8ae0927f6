use super::{SyncStrategy, Wiring, collect_channels};
use crate::{
    channel::ChannelPath,
    error::{Result, SyncError},
    message::MessageRef,
    selector::SelectorRef,
    types::{SyncDataHandler, SyncStats},
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Latches the latest message of every channel and publishes them all
/// once each channel has delivered at least one.
pub struct FirstMatchStrategy {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    slots: Option<IndexMap<ChannelPath, Option<MessageRef>>>,
    wiring: Wiring,
    published: u64,
    replaced: u64,
}

impl FirstMatchStrategy {
    pub const KEY: &'static str = "firstmatch";

    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for FirstMatchStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStrategy for FirstMatchStrategy {
    fn key(&self) -> &'static str {
        Self::KEY
    }

    fn initialize_channels(
        &self,
        primary: ChannelPath,
        subsidiaries: &[ChannelPath],
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.slots.is_some() {
            return Err(SyncError::AlreadyInitialized);
        }

        let channels = collect_channels(primary, subsidiaries)?;
        info!(channels = ?channels, "initialized first match synchronization");
        inner.slots = Some(channels.into_iter().map(|channel| (channel, None)).collect());
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
        let inner = &mut *guard;

        let slots = inner
            .slots
            .as_mut()
            .ok_or(SyncError::NotInitialized { what: "channels" })?;
        let handler = inner.wiring.handler()?;

        let Some(slot) = slots.get_mut(message.channel()) else {
            return Err(SyncError::UnknownChannel {
                channel: message.channel().clone(),
            });
        };
        if slot.replace(message.clone()).is_some() {
            trace!(channel = %message.channel(), "replaced latched message");
            inner.replaced += 1;
        }

        if slots.values().any(Option::is_none) {
            return Ok(());
        }

        let mut event = handler.create_event();
        for slot in slots.values_mut() {
            if let Some(message) = slot.take() {
                event.push(message);
            }
        }
        inner.published += 1;
        debug!(id = %event.id, members = event.len(), "publishing first match bundle");
        handler.handle(event);
        Ok(())
    }

    fn stats(&self) -> SyncStats {
        let inner = self.inner.lock();
        SyncStats {
            published: inner.published,
            dropped: inner.replaced,
            depths: inner
                .slots
                .iter()
                .flatten()
                .map(|(channel, slot)| (channel.clone(), usize::from(slot.is_some())))
                .collect(),
            ..SyncStats::default()
        }
    }
}
