//! Writer configuration.
//!
//! All limits have defaults matching the provider's documented quotas. A
//! config is usually assembled by [`StreamWriterBuilder`](crate::StreamWriterBuilder),
//! or read from the environment with [`WriterConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable                 | Field               | Default |
//! |--------------------------|---------------------|---------|
//! | `STREAM_NAME`            | `stream_name`       | required |
//! | `STREAM_MAX_BATCH_COUNT` | `max_batch_count`   | 500     |
//! | `STREAM_MAX_BATCH_BYTES` | `max_batch_bytes`   | 5 MiB   |
//! | `STREAM_MAX_ATTEMPTS`    | `max_attempts`      | 5       |
//! | `STREAM_BASE_DELAY_MS`   | `base_delay`        | 100     |
//! | `STREAM_MAX_DELAY_MS`    | `max_delay`         | 10000   |
//! | `STREAM_CONCURRENCY`     | `concurrency_limit` | 4       |
//! | `STREAM_SHARD_COUNT`     | `shard_count`       | 1       |

use crate::batch::{DEFAULT_MAX_BATCH_BYTES, DEFAULT_MAX_BATCH_COUNT};
use crate::error::{ClientError, Result};
use crate::provisioner::{DEFAULT_POLL_INTERVAL, DEFAULT_PROVISION_TIMEOUT};
use crate::retry::RetryPolicy;
use statementlog_core::{PartitionKeyStrategy, DEFAULT_MAX_RECORD_BYTES};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    /// Target stream; created on first write if absent.
    pub stream_name: String,

    /// Maximum records per provider call.
    pub max_batch_count: usize,

    /// Maximum encoded bytes (keys plus payloads) per provider call.
    pub max_batch_bytes: usize,

    /// Records larger than this are reported `TooLarge` and never sent.
    pub max_record_bytes: usize,

    /// Submissions per record, including the first.
    pub max_attempts: u32,

    pub base_delay: Duration,
    pub max_delay: Duration,

    /// Batches in flight at once for a single write.
    pub concurrency_limit: usize,

    /// Wait between describes while the stream is being created.
    pub poll_interval: Duration,
    pub provision_timeout: Duration,

    /// Shard count used when this writer creates the stream.
    pub shard_count: u32,

    pub partition_key: PartitionKeyStrategy,
}

impl WriterConfig {
    pub fn new(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            max_batch_count: DEFAULT_MAX_BATCH_COUNT,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            provision_timeout: DEFAULT_PROVISION_TIMEOUT,
            shard_count: 1,
            partition_key: PartitionKeyStrategy::default(),
        }
    }

    /// Load configuration from `STREAM_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stream_name = lookup("STREAM_NAME")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ClientError::ConfigError("STREAM_NAME is required".to_string()))?;

        let mut config = Self::new(stream_name);
        if let Some(v) = parse_var(&lookup, "STREAM_MAX_BATCH_COUNT")? {
            config.max_batch_count = v;
        }
        if let Some(v) = parse_var(&lookup, "STREAM_MAX_BATCH_BYTES")? {
            config.max_batch_bytes = v;
        }
        if let Some(v) = parse_var(&lookup, "STREAM_MAX_ATTEMPTS")? {
            config.max_attempts = v;
        }
        if let Some(ms) = parse_var(&lookup, "STREAM_BASE_DELAY_MS")? {
            config.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "STREAM_MAX_DELAY_MS")? {
            config.max_delay = Duration::from_millis(ms);
        }
        if let Some(v) = parse_var(&lookup, "STREAM_CONCURRENCY")? {
            config.concurrency_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "STREAM_SHARD_COUNT")? {
            config.shard_count = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the writer cannot honor.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: &str) -> Result<()> {
            Err(ClientError::ConfigError(msg.to_string()))
        }

        if self.stream_name.trim().is_empty() {
            return invalid("stream name must not be empty");
        }
        if self.max_batch_count == 0 {
            return invalid("max_batch_count must be at least 1");
        }
        if self.max_batch_bytes == 0 || self.max_record_bytes == 0 {
            return invalid("byte limits must be non-zero");
        }
        if self.max_record_bytes > self.max_batch_bytes {
            return invalid("max_record_bytes must not exceed max_batch_bytes");
        }
        if self.max_attempts == 0 {
            return invalid("max_attempts must be at least 1");
        }
        if self.base_delay > self.max_delay {
            return invalid("base_delay must not exceed max_delay");
        }
        if self.concurrency_limit == 0 {
            return invalid("concurrency_limit must be at least 1");
        }
        if self.shard_count == 0 {
            return invalid("shard_count must be at least 1");
        }
        if self.poll_interval.is_zero() || self.provision_timeout.is_zero() {
            return invalid("poll_interval and provision_timeout must be non-zero");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.base_delay, self.max_delay)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| {
                ClientError::ConfigError(format!("{} has invalid value '{}'", name, raw))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = WriterConfig::new("statements");
        assert_eq!(config.max_batch_count, 500);
        assert_eq!(config.max_batch_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_record_bytes, 1024 * 1024);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.concurrency_limit, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        let mut config = WriterConfig::new("statements");
        config.max_record_bytes = config.max_batch_bytes + 1;
        assert!(config.validate().is_err());

        let mut config = WriterConfig::new("statements");
        config.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = WriterConfig::new("statements");
        config.base_delay = Duration::from_secs(20);
        assert!(config.validate().is_err());

        assert!(WriterConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_provisioning_durations() {
        let mut config = WriterConfig::new("statements");
        config.poll_interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ClientError::ConfigError(_))));

        let mut config = WriterConfig::new("statements");
        config.provision_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ClientError::ConfigError(_))));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = WriterConfig::from_lookup(lookup(&[
            ("STREAM_NAME", "statements"),
            ("STREAM_MAX_BATCH_COUNT", "100"),
            ("STREAM_MAX_ATTEMPTS", "3"),
            ("STREAM_BASE_DELAY_MS", "50"),
            ("STREAM_CONCURRENCY", "8"),
            ("STREAM_SHARD_COUNT", "2"),
        ]))
        .unwrap();

        assert_eq!(config.stream_name, "statements");
        assert_eq!(config.max_batch_count, 100);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(50));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.concurrency_limit, 8);
        assert_eq!(config.shard_count, 2);
    }

    #[test]
    fn test_from_lookup_requires_stream_name() {
        let err = WriterConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("STREAM_NAME"));
    }

    #[test]
    fn test_from_lookup_rejects_malformed_number() {
        let err = WriterConfig::from_lookup(lookup(&[
            ("STREAM_NAME", "statements"),
            ("STREAM_MAX_ATTEMPTS", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ClientError::ConfigError(_)));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = WriterConfig::new("statements");
        config.max_attempts = 7;
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
    }
}
