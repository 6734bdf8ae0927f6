//! SyncNode implementation.

use crate::config::NodeConfig;
use eyre::{Result, WrapErr};
use futures::{Stream, StreamExt};
use itertools::{Itertools, MinMaxResult};
use std::{sync::Arc, time::Instant};
use timesync_core::{
    ChannelPath, Message, SelectorRef, StrategyRegistry, SyncDataHandler, SyncError, SyncEvent,
    SyncStats, SyncStrategy,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// User timestamp holding the earliest selected timestamp of a bundle.
pub const EARLIEST_TIMESTAMP: &str = "timesync:earliest";

/// User timestamp holding the latest selected timestamp of a bundle.
pub const LATEST_TIMESTAMP: &str = "timesync:latest";

/// Forwards finished bundles into the output channel of the node.
struct ForwardingHandler {
    channel: ChannelPath,
    selector: SelectorRef,
    tx: flume::Sender<SyncEvent>,
}

impl SyncDataHandler for ForwardingHandler {
    fn create_event(&self) -> SyncEvent {
        SyncEvent::new(Some(self.channel.clone()))
    }

    fn handle(&self, mut event: SyncEvent) {
        let timestamps = event
            .messages()
            .filter_map(|message| self.selector.timestamp(message).ok())
            .minmax();
        let bounds = match timestamps {
            MinMaxResult::NoElements => None,
            MinMaxResult::OneElement(ts) => Some((ts, ts)),
            MinMaxResult::MinMax(earliest, latest) => Some((earliest, latest)),
        };
        if let Some((earliest, latest)) = bounds {
            event.user_times.insert(EARLIEST_TIMESTAMP.to_string(), earliest);
            event.user_times.insert(LATEST_TIMESTAMP.to_string(), latest);
        }

        let id = event.id;
        if self.tx.send(event).is_err() {
            error!(%id, channel = %self.channel, "output receiver is gone, bundle lost");
        }
    }
}

/// The synchronization node.
///
/// The node pulls messages from an input stream, feeds them to the
/// configured strategy and publishes the synchronized bundles on a
/// channel obtained from [`SyncNode::output`].
pub struct SyncNode {
    config: NodeConfig,
    strategy: Box<dyn SyncStrategy>,
    output_rx: flume::Receiver<SyncEvent>,
    stats_tx: watch::Sender<SyncStats>,
}

impl SyncNode {
    /// Create a new SyncNode with the built-in strategies.
    pub fn new(config: NodeConfig) -> Result<Self> {
        Self::with_registry(config, &StrategyRegistry::with_defaults())
    }

    /// Create a new SyncNode that looks up its strategy in `registry`.
    pub fn with_registry(config: NodeConfig, registry: &StrategyRegistry) -> Result<Self> {
        config.validate()?;

        let selector = config
            .sync
            .selector()
            .wrap_err("Failed to build the timestamp selector")?;
        let strategy = registry
            .create(&config.sync)
            .wrap_err("Failed to create the sync strategy")?;

        let (output_tx, output_rx) = flume::unbounded();
        let handler = ForwardingHandler {
            channel: config.output.clone(),
            selector: selector.clone(),
            tx: output_tx,
        };

        strategy.initialize_channels(config.primary.clone(), &config.subsidiaries)?;
        strategy.set_timestamp_selector(selector);
        strategy.set_sync_data_handler(Arc::new(handler));

        info!(
            strategy = strategy.key(),
            primary = %config.primary,
            subsidiaries = ?config.subsidiaries,
            output = %config.output,
            timestamps = ?config.sync.timestamps,
            "Creating SyncNode"
        );

        let (stats_tx, _) = watch::channel(strategy.stats());

        Ok(Self {
            config,
            strategy,
            output_rx,
            stats_tx,
        })
    }

    /// The receiving end of the output channel.
    pub fn output(&self) -> flume::Receiver<SyncEvent> {
        self.output_rx.clone()
    }

    /// Statistics of the strategy, updated after every input message.
    pub fn stats(&self) -> watch::Receiver<SyncStats> {
        self.stats_tx.subscribe()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Run the synchronization loop.
    ///
    /// This consumes the node and runs until the input stream ends or
    /// yields an error. Messages on unknown channels, without the
    /// configured timestamp or too far in the future to be scheduled are
    /// logged and skipped. The strategy is shut
    /// down before returning, so pending bundles are published.
    pub async fn run<S>(self, mut input: S) -> Result<()>
    where
        S: Stream<Item = Result<Message>> + Unpin,
    {
        info!(
            strategy = self.strategy.key(),
            "Starting synchronization loop"
        );

        let mut last_stats_log = Instant::now();
        let result = loop {
            let Some(item) = input.next().await else {
                break Ok(());
            };
            let message = match item {
                Ok(message) => message,
                Err(err) => break Err(err.wrap_err("Input stream failed")),
            };

            let channel = message.channel().clone();
            let id = message.id();
            match self.strategy.handle(Arc::new(message)) {
                Ok(()) => {
                    debug!(channel = %channel, %id, "Message handed to strategy");
                }
                Err(
                    err @ (SyncError::UnknownChannel { .. }
                    | SyncError::NoSuchTimestamp { .. }
                    | SyncError::DeadlineOutOfRange { .. }),
                ) => {
                    warn!(channel = %channel, %id, "Skipping message: {err}");
                }
                Err(err) => {
                    break Err(err).wrap_err_with(|| format!("Failed to handle message {id}"));
                }
            }

            self.stats_tx.send_replace(self.strategy.stats());

            // Periodically log statistics
            if last_stats_log.elapsed() >= self.config.stats_interval {
                self.log_stats();
                last_stats_log = Instant::now();
            }
        };

        self.strategy.shutdown();
        self.stats_tx.send_replace(self.strategy.stats());

        // Log final statistics
        info!("Synchronization loop ended");
        self.log_stats();

        result
    }

    fn log_stats(&self) {
        let stats = self.strategy.stats();
        info!(
            published = stats.published,
            dropped = stats.dropped,
            discarded = stats.discarded,
            depths = ?stats.depths,
            drop_flagged = ?stats.drop_flagged,
            "Synchronization statistics"
        );
    }
}
