use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use timesync_core::{
    ChannelPath, Config, Message, MessageId, MessageRef, StrategyRegistry, SyncDataHandler,
    SyncEvent, SyncStrategy, Timestamp,
};
use uuid::Uuid;

/// Origin of every message created by the tests.
pub const ORIGIN: Uuid = Uuid::from_u128(0x7157_0000_0000_0000_0000_0000_0000_0001);

/// Route engine logs to the test output, honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn channel(name: &str) -> ChannelPath {
    name.parse().unwrap()
}

pub fn create_message(channel_name: &str, sequence: u64, timestamp: Timestamp) -> MessageRef {
    Message::builder(MessageId::new(ORIGIN, sequence), channel(channel_name))
        .create_time(timestamp)
        .payload(format!("msg_{sequence}").into_bytes())
        .build_ref()
}

/// A handler that keeps every published bundle.
#[derive(Default)]
pub struct Collector {
    events: Mutex<Vec<SyncEvent>>,
}

impl Collector {
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SyncDataHandler for Collector {
    fn handle(&self, event: SyncEvent) {
        self.events.lock().push(event);
    }
}

/// Creates a wired strategy for `config` with the first channel as
/// primary.
pub fn create_strategy(config: &Config, channels: &[&str]) -> (Box<dyn SyncStrategy>, Arc<Collector>) {
    init_tracing();
    let registry = StrategyRegistry::with_defaults();
    let strategy = registry.create(config).unwrap();

    let (primary, subsidiaries) = channels.split_first().unwrap();
    let subsidiaries: Vec<_> = subsidiaries.iter().map(|name| channel(name)).collect();
    strategy
        .initialize_channels(channel(primary), &subsidiaries)
        .unwrap();

    let collector = Arc::new(Collector::default());
    strategy.set_sync_data_handler(collector.clone());
    (strategy, collector)
}

/// Builds an ordered sequence of deliveries and replays it into a
/// strategy.
#[derive(Default)]
pub struct ScenarioBuilder {
    deliveries: Vec<MessageRef>,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(mut self, channel_name: &str, timestamp: Timestamp) -> Self {
        let sequence = self.deliveries.len() as u64;
        self.deliveries
            .push(create_message(channel_name, sequence, timestamp));
        self
    }

    #[allow(dead_code)]
    pub fn add_messages(mut self, channel_name: &str, timestamps: &[Timestamp]) -> Self {
        for &ts in timestamps {
            self = self.add_message(channel_name, ts);
        }
        self
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    /// Hands every message to the strategy in order.
    pub fn replay(self, strategy: &dyn SyncStrategy) {
        for message in self.deliveries {
            strategy.handle(message).unwrap();
        }
    }
}

/// Create timestamps of a bundle keyed by channel name.
#[allow(dead_code)]
pub fn bundle_timestamps(event: &SyncEvent) -> IndexMap<String, Timestamp> {
    event
        .messages()
        .map(|msg| (msg.channel().to_string(), msg.timestamps().create))
        .collect()
}

/// Checks that every bundle holds exactly one message per channel and
/// that its causes are exactly the member ids.
#[allow(dead_code)]
pub fn assert_bundles_valid(events: &[SyncEvent], channels: &[&str]) {
    for event in events {
        assert_eq!(event.len(), channels.len(), "bundle size mismatch: {event:?}");
        for name in channels {
            let messages = &event.events[&channel(name)];
            assert_eq!(messages.len(), 1);
        }

        let mut member_ids: Vec<_> = event.messages().map(|msg| msg.id()).collect();
        let mut causes: Vec<_> = event.causes.iter().copied().collect();
        member_ids.sort();
        causes.sort();
        assert_eq!(member_ids, causes);
    }
}

/// Checks that no message is bundled twice and that every channel's
/// messages appear in delivery order.
#[allow(dead_code)]
pub fn assert_contiguous(events: &[SyncEvent]) {
    let mut last: IndexMap<ChannelPath, u64> = IndexMap::new();
    for event in events {
        for message in event.messages() {
            let sequence = message.id().sequence;
            if let Some(&previous) = last.get(message.channel()) {
                assert!(
                    sequence > previous,
                    "{} reused or reordered on {}",
                    sequence,
                    message.channel()
                );
            }
            last.insert(message.channel().clone(), sequence);
        }
    }
}
