//! Cache configuration.
//!
//! Injected at construction from the resolved settings snapshot.

use std::time::Duration;

const DEFAULT_STORE_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Deployment-wide response cache feature flag. When off, responses are
    /// still served through the handler but never written to the store.
    pub response_cache: bool,
    /// Deadline applied to every store operation.
    pub store_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            response_cache: true,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            response_cache: settings.response_cache,
            store_timeout_ms: settings.store_timeout.as_millis() as u64,
        }
    }
}

impl CacheConfig {
    /// Store deadline, never zero.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.response_cache);
        assert_eq!(config.store_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn zero_timeout_clamps_to_one_millisecond() {
        let config = CacheConfig {
            store_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.store_timeout(), Duration::from_millis(1));
    }
}
