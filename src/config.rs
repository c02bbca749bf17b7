//! Runtime configuration for tracepack
//!
//! Configuration is read from an optional TOML file and then overridden by
//! command-line flags.
//!
//! # Example tracepack.toml
//!
//! ```toml
//! # What to do with payloads longer than 65535 elements
//! truncation = "reject"
//!
//! [ring_buffer]
//! capacity = 8192
//! batch_size = 100
//! idle_sleep_ms = 10
//! ```

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Handling of payloads longer than the maximum representable length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TruncationPolicy {
    /// Fail with `RecordError::TooManyElements`
    #[default]
    Reject,
    /// Keep the first 65535 elements and log a warning
    Clamp,
}

/// Sizing of the record hand-off queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingBufferConfig {
    /// Maximum number of records in flight
    pub capacity: usize,
    /// Records handed to the sink per batch
    pub batch_size: usize,
    /// Sidecar sleep when the queue is empty
    pub idle_sleep_ms: u64,
}

impl Default for RingBufferConfig {
    fn default() -> Self {
        RingBufferConfig {
            capacity: 8192,
            batch_size: 100,
            idle_sleep_ms: 10,
        }
    }
}

/// Root configuration for tracepack.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracepackConfig {
    pub truncation: TruncationPolicy,
    pub ring_buffer: RingBufferConfig,
}

impl TracepackConfig {
    /// Load configuration from a TOML file
    ///
    /// ```no_run
    /// use tracepack::config::TracepackConfig;
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = TracepackConfig::from_file("tracepack.toml")?;
    /// println!("truncation: {:?}", config.truncation);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.ring_buffer.capacity == 0 {
            anyhow::bail!("ring_buffer.capacity must be > 0");
        }
        if self.ring_buffer.batch_size == 0 {
            anyhow::bail!("ring_buffer.batch_size must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracepackConfig::default();
        assert_eq!(config.truncation, TruncationPolicy::Reject);
        assert_eq!(config.ring_buffer.capacity, 8192);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TracepackConfig::from_toml_str("").unwrap();
        assert_eq!(config, TracepackConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            truncation = "clamp"

            [ring_buffer]
            capacity = 64
            batch_size = 8
        "#;

        let config = TracepackConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.truncation, TruncationPolicy::Clamp);
        assert_eq!(config.ring_buffer.capacity, 64);
        assert_eq!(config.ring_buffer.batch_size, 8);
        assert_eq!(config.ring_buffer.idle_sleep_ms, 10);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(TracepackConfig::from_toml_str(r#"truncation = "wrap""#).is_err());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let toml = r#"
            [ring_buffer]
            capacity = 0
        "#;
        let err = TracepackConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }
}
