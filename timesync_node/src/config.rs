//! Configuration parsing and validation for the sync node.

use eyre::{Result, WrapErr, bail, ensure};
use serde::Deserialize;
use std::{collections::HashSet, fs, path::Path, time::Duration};
use timesync_core::{ChannelPath, Config as SyncConfig};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// The channel the bundles are organized around.
    pub primary: ChannelPath,

    /// Further channels to synchronize with the primary one.
    pub subsidiaries: Vec<ChannelPath>,

    /// Channel the synchronized bundles are published on.
    pub output: ChannelPath,

    /// Synchronization parameters.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Interval of the statistics log line.
    #[serde(default = "default_stats_interval", with = "humantime_serde")]
    pub stats_interval: Duration,
}

fn default_stats_interval() -> Duration {
    Duration::from_secs(10)
}

impl NodeConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let config: NodeConfig = serde_yaml::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// All input channels, primary first.
    pub fn inputs(&self) -> impl Iterator<Item = &ChannelPath> {
        std::iter::once(&self.primary).chain(&self.subsidiaries)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.subsidiaries.is_empty(),
            "At least one subsidiary channel is required"
        );

        let mut seen = HashSet::new();
        for channel in self.inputs() {
            if !seen.insert(channel) {
                bail!("Duplicate input channel: {channel}");
            }
        }

        ensure!(
            !seen.contains(&self.output),
            "Output channel {} must differ from the input channels",
            self.output
        );

        ensure!(
            !self.stats_interval.is_zero(),
            "stats_interval must be greater than zero"
        );

        self.sync
            .validate()
            .wrap_err("Invalid sync configuration")?;

        Ok(())
    }
}
