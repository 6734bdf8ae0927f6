//! The strategy interface and the registry that builds strategies by
//! key.

mod approximate;
mod first_match;
mod time_frame;

pub use approximate::ApproximateTimeStrategy;
pub use first_match::FirstMatchStrategy;
pub use time_frame::TimeFrameStrategy;

use crate::{
    channel::ChannelPath,
    config::Config,
    error::{Result, SyncError},
    message::MessageRef,
    selector::{SelectorRef, SystemTimestampSelector},
    types::{SyncDataHandler, SyncStats},
};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

/// Common interface of all synchronization strategies.
///
/// Call order: [`initialize_channels`](SyncStrategy::initialize_channels)
/// once, then wire the handler and optionally the selector, then feed
/// messages through [`handle`](SyncStrategy::handle), possibly from
/// several threads at once.
pub trait SyncStrategy: Send + Sync {
    /// The registry key of this strategy.
    fn key(&self) -> &'static str;

    /// Fixes the set of channels this instance accepts.
    fn initialize_channels(&self, primary: ChannelPath, subsidiaries: &[ChannelPath])
    -> Result<()>;

    fn set_sync_data_handler(&self, handler: Arc<dyn SyncDataHandler>);

    fn set_timestamp_selector(&self, selector: SelectorRef);

    /// Ingests one message and publishes every bundle that became
    /// complete because of it.
    fn handle(&self, message: MessageRef) -> Result<()>;

    fn stats(&self) -> SyncStats;

    /// Stops background work. Strategies without background work do
    /// nothing.
    fn shutdown(&self) {}
}

/// The built-in strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    #[default]
    #[serde(rename = "approxt")]
    ApproximateTime,
    #[serde(rename = "firstmatch")]
    FirstMatch,
    #[serde(rename = "timeframe")]
    TimeFrame,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::ApproximateTime,
        StrategyKind::FirstMatch,
        StrategyKind::TimeFrame,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StrategyKind::ApproximateTime => ApproximateTimeStrategy::KEY,
            StrategyKind::FirstMatch => FirstMatchStrategy::KEY,
            StrategyKind::TimeFrame => TimeFrameStrategy::KEY,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for StrategyKind {
    type Err = SyncError;

    fn from_str(key: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == key)
            .ok_or_else(|| SyncError::UnknownStrategy {
                key: key.to_string(),
                available: Self::ALL.iter().join(", "),
            })
    }
}

/// Builds a strategy from its configuration.
pub type StrategyFactory = fn(&Config) -> Result<Box<dyn SyncStrategy>>;

/// Maps strategy keys to factories.
///
/// The registry is an ordinary value: build it once at startup and pass
/// it where strategies are created.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    factories: IndexMap<&'static str, StrategyFactory>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry containing the built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ApproximateTimeStrategy::KEY, |config| {
            Ok(Box::new(ApproximateTimeStrategy::new(config)?))
        });
        registry.register(FirstMatchStrategy::KEY, |_| {
            Ok(Box::new(FirstMatchStrategy::new()))
        });
        registry.register(TimeFrameStrategy::KEY, |config| {
            Ok(Box::new(TimeFrameStrategy::new(config)?))
        });
        registry
    }

    /// Registers a factory. A factory already registered under the same
    /// key is replaced and returned.
    pub fn register(&mut self, key: &'static str, factory: StrategyFactory) -> Option<StrategyFactory> {
        self.factories.insert(key, factory)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Creates the strategy selected by `config.strategy`.
    pub fn create(&self, config: &Config) -> Result<Box<dyn SyncStrategy>> {
        self.create_by_key(config.strategy.key(), config)
    }

    pub fn create_by_key(&self, key: &str, config: &Config) -> Result<Box<dyn SyncStrategy>> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| SyncError::UnknownStrategy {
                key: key.to_string(),
                available: self.keys().join(", "),
            })?;
        config.validate()?;
        factory(config)
    }
}

/// The handler and selector every strategy is wired with.
pub(crate) struct Wiring {
    handler: Option<Arc<dyn SyncDataHandler>>,
    selector: SelectorRef,
}

impl Default for Wiring {
    fn default() -> Self {
        Self {
            handler: None,
            selector: Arc::new(SystemTimestampSelector::create()),
        }
    }
}

impl Wiring {
    pub fn set_handler(&mut self, handler: Arc<dyn SyncDataHandler>) {
        self.handler = Some(handler);
    }

    pub fn set_selector(&mut self, selector: SelectorRef) {
        self.selector = selector;
    }

    pub fn handler(&self) -> Result<&Arc<dyn SyncDataHandler>> {
        self.handler.as_ref().ok_or(SyncError::NotInitialized {
            what: "sync data handler",
        })
    }

    pub fn selector(&self) -> &SelectorRef {
        &self.selector
    }
}

/// Collects the primary and subsidiary channels in order, rejecting
/// duplicates.
pub(crate) fn collect_channels(
    primary: ChannelPath,
    subsidiaries: &[ChannelPath],
) -> Result<IndexSet<ChannelPath>> {
    let mut channels = IndexSet::with_capacity(subsidiaries.len() + 1);
    channels.insert(primary);
    for channel in subsidiaries {
        if !channels.insert(channel.clone()) {
            return Err(SyncError::InvalidConfig(format!(
                "channel {channel} is configured more than once"
            )));
        }
    }
    Ok(channels)
}

/// Checks if a message on `actual` belongs to the configured `channel`.
pub(crate) fn is_on_channel(actual: &ChannelPath, channel: &ChannelPath) -> bool {
    actual == channel || actual.is_sub_channel_of(channel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_keys() {
        assert_eq!(StrategyKind::ApproximateTime.key(), "approxt");
        assert_eq!(StrategyKind::FirstMatch.key(), "firstmatch");
        assert_eq!(StrategyKind::TimeFrame.key(), "timeframe");
        assert_eq!("timeframe".parse::<StrategyKind>().unwrap(), StrategyKind::TimeFrame);

        let err = "exact".parse::<StrategyKind>().unwrap_err();
        assert_eq!(
            err,
            SyncError::UnknownStrategy {
                key: "exact".to_string(),
                available: "approxt, firstmatch, timeframe".to_string()
            }
        );
    }

    #[test]
    fn test_registry_defaults() {
        let registry = StrategyRegistry::with_defaults();
        assert_eq!(
            registry.keys().collect::<Vec<_>>(),
            vec!["approxt", "firstmatch", "timeframe"]
        );

        for kind in StrategyKind::ALL {
            let config = Config {
                strategy: kind,
                ..Config::default()
            };
            let strategy = registry.create(&config).unwrap();
            assert_eq!(strategy.key(), kind.key());
            strategy.shutdown();
        }
    }

    #[test]
    fn test_registry_unknown_key() {
        let registry = StrategyRegistry::new();
        let err = registry.create(&Config::default()).err().unwrap();
        assert!(matches!(err, SyncError::UnknownStrategy { key, .. } if key == "approxt"));

        let registry = StrategyRegistry::with_defaults();
        assert!(registry.create_by_key("nope", &Config::default()).is_err());
        assert!(!registry.contains("nope"));
    }

    #[test]
    fn test_registry_validates_config() {
        let registry = StrategyRegistry::with_defaults();
        let err = registry.create(&Config::approximate(0)).err().unwrap();
        assert!(matches!(err, SyncError::InvalidConfig(_)));
    }

    #[test]
    fn test_collect_channels_rejects_duplicates() {
        let a: ChannelPath = "/a".parse().unwrap();
        let b: ChannelPath = "/b".parse().unwrap();

        let channels = collect_channels(a.clone(), &[b.clone()]).unwrap();
        assert_eq!(channels.into_iter().collect::<Vec<_>>(), vec![a.clone(), b.clone()]);
        assert!(collect_channels(a.clone(), &[b.clone(), b]).is_err());
        assert!(collect_channels(a.clone(), &[a]).is_err());
    }
}
