//! Upstream client configuration

use std::time::Duration;

use crate::framer::DEFAULT_MAX_EVENT_SIZE;

/// Upstream HTTP client options
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,

    /// Whole-request timeout for one-shot fetches (never applied to streams)
    pub request_timeout: Duration,

    /// User-Agent header sent upstream
    pub user_agent: String,

    /// Maximum size of a single framed event
    pub max_event_size: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
        }
    }
}

impl UpstreamConfig {
    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set one-shot request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set the maximum event size (at least 1 byte)
    pub fn max_event_size(mut self, size: usize) -> Self {
        self.max_event_size = size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UpstreamConfig::default();

        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("sse-fanout/"));
        assert_eq!(config.max_event_size, DEFAULT_MAX_EVENT_SIZE);
    }

    #[test]
    fn test_builder_chaining() {
        let config = UpstreamConfig::default()
            .connect_timeout(Duration::from_secs(2))
            .request_timeout(Duration::from_secs(5))
            .user_agent("weather-ui")
            .max_event_size(4096);

        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "weather-ui");
        assert_eq!(config.max_event_size, 4096);
    }

    #[test]
    fn test_max_event_size_floor() {
        let config = UpstreamConfig::default().max_event_size(0);

        assert_eq!(config.max_event_size, 1);
    }
}
