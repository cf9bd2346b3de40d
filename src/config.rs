//! In-process configuration surface (§11).
//!
//! Loading these values from a file or environment is out of scope —
//! callers build a [`RouterConfig`] programmatically, the same way the
//! teacher crate's `RpcPoolConfig` is built with `with_*` methods.

use std::time::Duration;

/// Default per-result-set page size (§3).
pub const DEFAULT_FETCH_PAGE_SIZE: u32 = 100;

/// LOB block payload size in bytes (§3, §6).
pub const LOB_BLOCK_SIZE: usize = 1024;

/// Outbound message size limit for the "default" pool profile.
pub const DEFAULT_MAX_OUTBOUND_BYTES: usize = 4 * 1024 * 1024;

/// Outbound message size limit for profiles configured for large
/// payloads.
pub const LARGE_MAX_OUTBOUND_BYTES: usize = 16 * 1024 * 1024;

/// Retry/session/LOB tuning for a [`crate::dispatcher::Dispatcher`].
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// `None` means unlimited retries (the delay between attempts still
    /// applies).
    pub max_attempts: Option<u32>,
    pub retry_delay: Duration,
    pub fetch_page_size: u32,
    pub max_outbound_message_bytes: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(3),
            retry_delay: Duration::from_millis(200),
            fetch_page_size: DEFAULT_FETCH_PAGE_SIZE,
            max_outbound_message_bytes: DEFAULT_MAX_OUTBOUND_BYTES,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_fetch_page_size(mut self, fetch_page_size: u32) -> Self {
        self.fetch_page_size = fetch_page_size;
        self
    }

    pub fn with_max_outbound_message_bytes(mut self, bytes: usize) -> Self {
        self.max_outbound_message_bytes = bytes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = RouterConfig::default();
        assert_eq!(cfg.fetch_page_size, 100);
        assert_eq!(cfg.max_outbound_message_bytes, 4 * 1024 * 1024);
        assert_eq!(cfg.max_attempts, Some(3));
    }

    #[test]
    fn builder_overrides_apply() {
        let cfg = RouterConfig::new()
            .with_max_attempts(None)
            .with_retry_delay(Duration::from_secs(1))
            .with_fetch_page_size(50)
            .with_max_outbound_message_bytes(LARGE_MAX_OUTBOUND_BYTES);
        assert_eq!(cfg.max_attempts, None);
        assert_eq!(cfg.fetch_page_size, 50);
        assert_eq!(cfg.max_outbound_message_bytes, LARGE_MAX_OUTBOUND_BYTES);
    }
}
