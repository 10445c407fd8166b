use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::pattern::{self, PatternSet};
use crate::registry::Capabilities;

/// Top-level configuration for the mqstat collector.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Name of the queue manager to monitor.
    #[serde(default)]
    pub queue_manager: String,

    /// Comma-separated queue name patterns. `*` is a wildcard; a leading `!`
    /// excludes matching queues. Default: "*".
    #[serde(default = "default_queues")]
    pub queues: String,

    /// How long to wait for each reply message. Default: 3s.
    #[serde(default = "default_reply_timeout", with = "humantime_serde")]
    pub reply_timeout: Duration,

    /// How often queue status is collected. Default: 60s.
    #[serde(default = "default_collect_interval", with = "humantime_serde")]
    pub collect_interval: Duration,

    /// How often the queue inventory and attributes are refreshed.
    /// Default: 1h.
    #[serde(default = "default_rediscover_interval", with = "humantime_serde")]
    pub rediscover_interval: Duration,

    /// Deployment capability flags.
    #[serde(default)]
    pub capabilities: Capabilities,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_queues() -> String {
    "*".to_string()
}

fn default_reply_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_collect_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_rediscover_interval() -> Duration {
    Duration::from_secs(3600)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            queue_manager: String::new(),
            queues: default_queues(),
            reply_timeout: default_reply_timeout(),
            collect_interval: default_collect_interval(),
            rediscover_interval: default_rediscover_interval(),
            capabilities: Capabilities::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.queue_manager.trim().is_empty() {
            bail!("queue_manager is required");
        }

        if PatternSet::parse(&self.queues).is_empty() {
            bail!("queues must contain at least one pattern");
        }

        for segment in pattern::split(&self.queues) {
            let body = segment.strip_prefix(pattern::EXCLUDE_MARKER).unwrap_or(segment);
            if body.contains(pattern::EXCLUDE_MARKER) {
                bail!("queue pattern {segment:?}: '!' is only allowed as a prefix");
            }
        }

        if self.reply_timeout.is_zero() {
            bail!("reply_timeout must be positive");
        }

        if self.collect_interval.is_zero() {
            bail!("collect_interval must be positive");
        }

        if self.rediscover_interval < self.collect_interval {
            bail!(
                "rediscover_interval ({:?}) must not be shorter than collect_interval ({:?})",
                self.rediscover_interval,
                self.collect_interval,
            );
        }

        if self.reply_timeout >= self.collect_interval {
            bail!("reply_timeout must be shorter than collect_interval");
        }

        if self.capabilities.use_reset_q_stats && !self.capabilities.reset_stats_enabled() {
            bail!("capabilities.use_reset_q_stats is only supported on platform zos");
        }

        Ok(())
    }
}
