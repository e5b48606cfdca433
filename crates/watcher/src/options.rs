//! Tunables for a watch

use crate::decode::EventPolicy;
use crate::error::{Result, WatchError};
use crate::filter::ChangeFilter;
use crate::queue::DEFAULT_BACKLOG_BYTES;
use crate::record::HEADER_LEN;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default size of the buffer handed to each read
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Smallest read buffer that holds a record with a one-character name
pub const MIN_READ_BUFFER: usize = HEADER_LEN + 4;

/// Everything needed to start a watch besides the path and the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Include the whole subtree
    #[serde(default = "default_true")]
    pub recursive: bool,

    #[serde(default)]
    pub filter: ChangeFilter,

    /// Bytes per read
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Bytes of records held while no read is armed before the next read
    /// reports an overflow
    #[serde(default = "default_backlog_bytes")]
    pub backlog_bytes: usize,

    /// Wake up this often with nothing to report (liveness trace only)
    #[serde(default)]
    pub wait_timeout_ms: Option<u64>,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub policy: EventPolicy,
}

impl WatchOptions {
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    /// Reject options that would make every read useless
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size < MIN_READ_BUFFER {
            return Err(WatchError::InvalidOptions {
                reason: format!(
                    "buffer_size must be at least {} bytes (got {})",
                    MIN_READ_BUFFER, self.buffer_size
                ),
            });
        }
        if self.backlog_bytes < self.buffer_size {
            return Err(WatchError::InvalidOptions {
                reason: format!(
                    "backlog_bytes ({}) must be at least buffer_size ({})",
                    self.backlog_bytes, self.buffer_size
                ),
            });
        }
        if self.wait_timeout_ms == Some(0) {
            return Err(WatchError::InvalidOptions {
                reason: "wait_timeout_ms must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            filter: ChangeFilter::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            backlog_bytes: DEFAULT_BACKLOG_BYTES,
            wait_timeout_ms: None,
            retry: RetryPolicy::default(),
            policy: EventPolicy::default(),
        }
    }
}

/// How transient read failures are retried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Pause between attempts, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Consecutive failures tolerated; `None` retries forever
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Whether `failures` consecutive failures have used up the budget
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff_ms: default_backoff_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_backlog_bytes() -> usize {
    DEFAULT_BACKLOG_BYTES
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_max_attempts() -> Option<u32> {
    Some(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.backoff(), Duration::from_secs(1));
        assert!(!retry.exhausted(9));
        assert!(retry.exhausted(10));

        let forever = RetryPolicy {
            max_attempts: None,
            ..retry
        };
        assert!(!forever.exhausted(u32::MAX));
    }

    #[test]
    fn test_defaults() {
        let options = WatchOptions::default();
        assert!(options.recursive);
        assert_eq!(options.buffer_size, 16 * 1024);
        assert_eq!(options.wait_timeout(), None);
        assert!(options.policy.emit_deleted);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unusable_buffers() {
        let zero = WatchOptions {
            buffer_size: 0,
            ..WatchOptions::default()
        };
        assert!(matches!(
            zero.validate(),
            Err(WatchError::InvalidOptions { .. })
        ));

        let header_only = WatchOptions {
            buffer_size: HEADER_LEN,
            ..WatchOptions::default()
        };
        assert!(header_only.validate().is_err());

        let smallest = WatchOptions {
            buffer_size: MIN_READ_BUFFER,
            ..WatchOptions::default()
        };
        assert!(smallest.validate().is_ok());

        let short_backlog = WatchOptions {
            backlog_bytes: DEFAULT_BUFFER_SIZE - 1,
            ..WatchOptions::default()
        };
        assert!(short_backlog.validate().is_err());

        let busy_wait = WatchOptions {
            wait_timeout_ms: Some(0),
            ..WatchOptions::default()
        };
        assert!(busy_wait.validate().is_err());
    }
}
