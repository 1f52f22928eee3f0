use std::env;
use std::time::Duration;

pub const DEFAULT_BUNDLE_ID: &str = "com.apple.appstore";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Bundle identifier of the storefront application
    pub bundle_id: String,
    /// Budget for internal waits (page loads, sheets, menus)
    pub timeout: Duration,
    /// Budget for `install` when the caller does not pass one
    pub install_timeout: Duration,
    /// Fixed cadence of the wait-for engine
    pub poll_interval: Duration,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            bundle_id: env::var("STOREFRONT_BUNDLE_ID")
                .ok()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BUNDLE_ID.to_string()),
            timeout: Duration::from_secs(env_u64("STOREFRONT_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
            install_timeout: Duration::from_secs(env_u64(
                "STOREFRONT_INSTALL_TIMEOUT_SECS",
                DEFAULT_INSTALL_TIMEOUT_SECS,
            )),
            poll_interval: Duration::from_millis(env_u64(
                "STOREFRONT_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bundle_id: DEFAULT_BUNDLE_ID.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            install_timeout: Duration::from_secs(DEFAULT_INSTALL_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable {}={:?}, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.bundle_id, "com.apple.appstore");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.install_timeout, Duration::from_secs(600));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_env_overrides_and_fallbacks() {
        // Keys are unique to this test so parallel tests do not interfere
        env::set_var("STOREFRONT_TEST_GOOD", "45");
        env::set_var("STOREFRONT_TEST_BAD", "soon");
        assert_eq!(env_u64("STOREFRONT_TEST_GOOD", 1), 45);
        assert_eq!(env_u64("STOREFRONT_TEST_BAD", 7), 7);
        assert_eq!(env_u64("STOREFRONT_TEST_MISSING", 9), 9);
        env::remove_var("STOREFRONT_TEST_GOOD");
        env::remove_var("STOREFRONT_TEST_BAD");
    }
}
