use crate::{
    error::{Result, SyncError},
    message::names,
    selector::{SelectorRef, selector_from_names},
    strategy::StrategyKind,
};
use serde::Deserialize;
use std::time::Duration;

/// Default bound on pending messages per channel.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 2;

/// Default half width of the window around a primary message.
pub const DEFAULT_TIME_FRAME: Duration = Duration::from_micros(250_000);

/// Default delay between a primary message and its evaluation.
pub const DEFAULT_BUFFER_TIME: Duration = Duration::from_micros(500_000);

/// Configuration parameters passed to
/// [StrategyRegistry::create](crate::StrategyRegistry::create).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The synchronization strategy to run.
    pub strategy: StrategyKind,

    /// The maximum number of messages kept for each channel
    /// (approximate time only).
    pub max_queue_size: usize,

    /// Subsidiary messages within this distance of a primary message are
    /// grouped with it (time frame only).
    #[serde(with = "humantime_serde")]
    pub time_frame: Duration,

    /// How long after its timestamp a primary message is evaluated, and
    /// how long subsidiary messages are retained (time frame only).
    #[serde(with = "humantime_serde")]
    pub buffer_time: Duration,

    /// Period of the eviction sweep. Defaults to twice the buffer time.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Option<Duration>,

    /// Timestamp names in priority order.
    pub timestamps: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            time_frame: DEFAULT_TIME_FRAME,
            buffer_time: DEFAULT_BUFFER_TIME,
            sweep_interval: None,
            timestamps: vec![names::CREATE.to_string()],
        }
    }
}

impl Config {
    /// Create config for the approximate time strategy.
    pub fn approximate(max_queue_size: usize) -> Self {
        Self {
            strategy: StrategyKind::ApproximateTime,
            max_queue_size,
            ..Self::default()
        }
    }

    /// Create config for the first match latch.
    pub fn first_match() -> Self {
        Self {
            strategy: StrategyKind::FirstMatch,
            ..Self::default()
        }
    }

    /// Create config for grouping subsidiary messages around primary
    /// messages.
    pub fn time_frame(time_frame: Duration, buffer_time: Duration) -> Self {
        Self {
            strategy: StrategyKind::TimeFrame,
            time_frame,
            buffer_time,
            ..Self::default()
        }
    }

    /// Set the timestamp names in priority order.
    pub fn with_timestamps<I, S>(mut self, timestamps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.timestamps = timestamps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = Some(sweep_interval);
        self
    }

    /// The effective sweep period.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.buffer_time * 2)
    }

    /// Builds the timestamp selector described by `timestamps`.
    pub fn selector(&self) -> Result<SelectorRef> {
        selector_from_names(&self.timestamps)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            return Err(SyncError::InvalidConfig(
                "max_queue_size must be positive".to_string(),
            ));
        }

        if self.timestamps.iter().all(|name| name.trim().is_empty()) {
            return Err(SyncError::InvalidConfig(
                "at least one timestamp name is required".to_string(),
            ));
        }

        if self.strategy == StrategyKind::TimeFrame {
            if self.buffer_time.is_zero() {
                return Err(SyncError::InvalidConfig(
                    "buffer_time must be positive for the time frame strategy".to_string(),
                ));
            }
            if self.sweep_interval().is_zero() {
                return Err(SyncError::InvalidConfig(
                    "sweep_interval must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }
}
