use crate::channel::ChannelPath;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by the synchronization engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A message arrived on a channel that was not passed to
    /// `initialize_channels`.
    #[error("received a message on channel {channel}, which is not one of the configured channels")]
    UnknownChannel { channel: ChannelPath },

    /// The active timestamp selector found no timestamp under the
    /// requested name.
    #[error("message does not contain a timestamp with name '{name}'")]
    NoSuchTimestamp { name: String },

    /// The strategy registry has no entry for the requested key.
    #[error("unknown sync strategy '{key}', available: {available}")]
    UnknownStrategy { key: String, available: String },

    /// A strategy was used before it was fully wired up.
    #[error("strategy is not initialized: missing {what}")]
    NotInitialized { what: &'static str },

    /// `initialize_channels` was called a second time.
    #[error("channels have already been initialized")]
    AlreadyInitialized,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid channel path '{path}': {reason}")]
    InvalidChannel { path: String, reason: &'static str },

    /// The delayed-task worker has been shut down.
    #[error("the scheduler has been shut down")]
    SchedulerStopped,

    /// A delay too large to be turned into a deadline.
    #[error("delay of {delay:?} is out of range")]
    DeadlineOutOfRange { delay: Duration },

    #[error("failed to spawn the scheduler worker: {0}")]
    SchedulerSpawn(String),
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
