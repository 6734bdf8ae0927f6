//! This library groups up timestamped messages arriving on several
//! channels into temporally aligned bundles.
//!
//! Three strategies are provided behind the [SyncStrategy] interface:
//!
//! - `approxt` ([ApproximateTimeStrategy]) emits one message per channel
//!   per bundle, choosing bundles with minimal timestamp spread while
//!   consuming every channel in order.
//! - `firstmatch` ([FirstMatchStrategy]) latches the latest message of
//!   every channel and emits once all channels have delivered.
//! - `timeframe` ([TimeFrameStrategy]) groups every primary message with
//!   the subsidiary messages within a time frame around it.
//!
//! # Usage
//!
//! ```rust
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//! use timesync_core::{
//!     ChannelPath, Config, Message, MessageId, StrategyRegistry, SyncDataHandler, SyncEvent,
//! };
//! use uuid::Uuid;
//!
//! // Collect the bundles published by the strategy.
//! #[derive(Default)]
//! struct Collect(Mutex<Vec<SyncEvent>>);
//!
//! impl SyncDataHandler for Collect {
//!     fn handle(&self, event: SyncEvent) {
//!         self.0.lock().push(event);
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let camera: ChannelPath = "/camera".parse()?;
//! let lidar: ChannelPath = "/lidar".parse()?;
//!
//! // Create the strategy from its configuration.
//! let registry = StrategyRegistry::with_defaults();
//! let strategy = registry.create(&Config::approximate(4))?;
//! strategy.initialize_channels(camera.clone(), &[lidar.clone()])?;
//! let handler = Arc::new(Collect::default());
//! strategy.set_sync_data_handler(handler.clone());
//!
//! // Feed messages, timestamps are in microseconds.
//! let origin = Uuid::new_v4();
//! let inputs = [(&camera, 1_000), (&lidar, 1_020), (&camera, 2_000), (&lidar, 2_010)];
//! for (sequence, (channel, ts)) in inputs.into_iter().enumerate() {
//!     let message = Message::builder(MessageId::new(origin, sequence as u64), channel.clone())
//!         .create_time(ts)
//!         .build_ref();
//!     strategy.handle(message)?;
//! }
//!
//! // The first camera frame was bundled with the first lidar scan.
//! let bundles = handler.0.lock();
//! assert_eq!(bundles.len(), 1);
//! assert_eq!(bundles[0].first(&lidar).unwrap().timestamps().create, 1_020);
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod candidate;
mod channel;
mod config;
mod error;
mod message;
pub mod scheduler;
pub mod selector;
pub mod state;
mod strategy;
mod types;

pub use channel::ChannelPath;
pub use config::{Config, DEFAULT_BUFFER_TIME, DEFAULT_MAX_QUEUE_SIZE, DEFAULT_TIME_FRAME};
pub use error::{Result, SyncError};
pub use message::{
    Message, MessageBuilder, MessageId, MessageRef, Timestamp, Timestamps, names, now_micros,
};
pub use selector::{SelectorRef, TimestampSelector, selector_from_list, selector_from_names};
pub use strategy::{
    ApproximateTimeStrategy, FirstMatchStrategy, StrategyFactory, StrategyKind, StrategyRegistry,
    SyncStrategy, TimeFrameStrategy,
};
pub use types::*;
