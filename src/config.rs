//! Configuration management.
//!
//! Options come from command-line arguments via clap, with environment
//! variable fallbacks under the `IMG_` prefix and sensible defaults for
//! everything.
//!
//! # Environment Variables
//!
//! - `IMG_HOST` - Server bind address (default: 0.0.0.0)
//! - `IMG_PORT` - Server port (default: 8787)
//! - `IMG_WORKERS` - Worker thread count; 0 = available parallelism
//! - `IMG_CACHE_CAPACITY` - Max cached responses (default: 100)
//! - `IMG_CACHE_TTL_SECS` - Cache entry time-to-live (default: 3600)
//! - `IMG_FETCH_TIMEOUT_SECS` - Remote download timeout; 0 = none (default: 30)

use std::time::Duration;

use clap::Parser;

use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS};
use crate::pool::default_worker_count;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8787;

/// Default remote-fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Image pixel service.
///
/// Accepts an image reference (local path or remote URL) plus an optional
/// resize target and returns the decoded pixels as JSON, caching responses
/// to avoid redundant work.
#[derive(Parser, Debug, Clone)]
#[command(name = "imgserve")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "IMG_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IMG_PORT")]
    pub port: u16,

    /// Number of worker threads (0 = use available parallelism).
    #[arg(long, default_value_t = 0, env = "IMG_WORKERS")]
    pub workers: usize,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Maximum number of cached responses.
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY, env = "IMG_CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// Cache entry time-to-live in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_SECS, env = "IMG_CACHE_TTL_SECS")]
    pub cache_ttl_secs: u64,

    // =========================================================================
    // Fetch Configuration
    // =========================================================================
    /// Timeout for remote image downloads in seconds (0 = no timeout).
    ///
    /// With no timeout, a stalled download occupies its worker indefinitely.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, env = "IMG_FETCH_TIMEOUT_SECS")]
    pub fetch_timeout_secs: u64,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_capacity == 0 {
            return Err("cache_capacity must be greater than 0".to_string());
        }
        if self.cache_ttl_secs == 0 {
            return Err("cache_ttl_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the worker count, falling back to available parallelism.
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            default_worker_count()
        } else {
            self.workers
        }
    }

    /// Cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Fetch timeout as a [`Duration`]; `None` disables the timeout.
    pub fn fetch_timeout(&self) -> Option<Duration> {
        if self.fetch_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.fetch_timeout_secs))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: 2,
            cache_capacity: 50,
            cache_ttl_secs: 600,
            fetch_timeout_secs: 10,
            verbose: false,
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_zero_cache_capacity_rejected() {
        let mut config = test_config();
        config.cache_capacity = 0;

        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("cache_capacity"));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = test_config();
        config.cache_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(test_config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_worker_count_explicit() {
        assert_eq!(test_config().worker_count(), 2);
    }

    #[test]
    fn test_worker_count_auto() {
        let mut config = test_config();
        config.workers = 0;
        assert!(config.worker_count() >= 1);
    }

    #[test]
    fn test_fetch_timeout_zero_means_none() {
        let mut config = test_config();
        config.fetch_timeout_secs = 0;
        assert_eq!(config.fetch_timeout(), None);

        config.fetch_timeout_secs = 10;
        assert_eq!(config.fetch_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_cache_ttl_duration() {
        assert_eq!(test_config().cache_ttl(), Duration::from_secs(600));
    }
}
