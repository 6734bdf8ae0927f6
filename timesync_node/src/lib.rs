//! timesync-node - drives a synchronization strategy from a message
//! stream.
//!
//! The node reads a YAML configuration naming the primary channel, the
//! subsidiary channels, the output channel and the `sync` parameters of
//! [timesync_core::Config]. Messages are pulled from any
//! [Stream](futures::Stream) of `eyre::Result<Message>`, which is where
//! the transport plugs in, and the synchronized bundles come out of a
//! `flume` channel, annotated with the user timestamps
//! `timesync:earliest` and `timesync:latest`.
//!
//! ```yaml
//! primary: /camera/left
//! subsidiaries: [/camera/right, /lidar/points]
//! output: /sync/stereo
//! sync:
//!   strategy: approxt
//!   max_queue_size: 8
//!   timestamps: [exposure, create]
//! ```

pub mod config;
pub mod node;

pub use config::NodeConfig;
pub use node::{EARLIEST_TIMESTAMP, LATEST_TIMESTAMP, SyncNode};

use tracing_subscriber::EnvFilter;

/// Install the `tracing` subscriber, honoring `RUST_LOG` and defaulting
/// to `info`. Does nothing if a subscriber is already installed.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
