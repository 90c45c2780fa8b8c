use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_UPSTREAM_URL: &str = "https://grok.x.com/2/grok/add_response.json";

// ─── Config ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,

    // Request body size limit (MB)
    pub body_limit_mb: usize,

    // Outbound proxy for upstream calls (http/https/socks5)
    pub proxy_url: Option<String>,

    // Logging
    pub logging_to_file: bool,
    pub log_dir: Option<String>,

    pub upstream: UpstreamConfig,
    pub retry: RetryConfig,
    pub conversations: ConversationConfig,
    pub streaming: StreamingConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8317,
            body_limit_mb: 10,
            proxy_url: None,
            logging_to_file: false,
            log_dir: None,
            upstream: UpstreamConfig::default(),
            retry: RetryConfig::default(),
            conversations: ConversationConfig::default(),
            streaming: StreamingConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file, sanitize, and validate.
    pub fn load(path: &str) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let mut config: Config = serde_yaml_ng::from_str(contents)?;
        config.sanitize();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        anyhow::ensure!(!self.upstream.url.is_empty(), "upstream.url must not be empty");
        anyhow::ensure!(
            self.retry.max_attempts >= 1,
            "retry.max-attempts must be at least 1"
        );
        anyhow::ensure!(
            self.retry.backoff_factor >= 1,
            "retry.backoff-factor must be at least 1"
        );
        anyhow::ensure!(
            self.streaming.channel_capacity >= 1,
            "streaming.channel-capacity must be at least 1"
        );
        if let Some(ref proxy) = self.proxy_url {
            crate::proxy::validate_proxy_url(proxy)?;
        }
        Ok(())
    }

    fn sanitize(&mut self) {
        self.upstream.url = self.upstream.url.trim().to_string();
        if self.proxy_url.as_deref().is_some_and(|p| p.trim().is_empty()) {
            self.proxy_url = None;
        }
        self.retry.retry_statuses.sort_unstable();
        self.retry.retry_statuses.dedup();
    }
}

// ─── Sub-configs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UpstreamConfig {
    pub url: String,
    /// Model option sent upstream and echoed on every client chunk.
    pub default_model: String,
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_UPSTREAM_URL.to_string(),
            default_model: "grok-3".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_factor: u32,
    /// Unit of the exponential backoff: wait = base * factor^attempt.
    pub base_delay_ms: u64,
    pub attempt_timeout_secs: u64,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor: 2,
            base_delay_ms: 1000,
            attempt_timeout_secs: 30,
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConversationConfig {
    pub max_entries: u64,
    /// Conversations untouched for this long are evicted.
    pub idle_ttl_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            idle_ttl_secs: 24 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StreamingConfig {
    pub keepalive_seconds: u64,
    /// Frames buffered between the upstream reader task and the client body.
    pub channel_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            keepalive_seconds: 15,
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_minute: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8317);
        assert_eq!(cfg.upstream.url, DEFAULT_UPSTREAM_URL);
        assert_eq!(cfg.upstream.default_model, "grok-3");
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.backoff_factor, 2);
        assert_eq!(cfg.retry.attempt_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.retry.retry_statuses, vec![429, 500, 502, 503, 504]);
        assert_eq!(cfg.streaming.keepalive_seconds, 15);
        assert!(!cfg.rate_limit.enabled);
        assert_eq!(cfg.rate_limit.requests_per_minute, 10);
    }

    #[test]
    fn test_yaml_deserialization() {
        let yaml = r#"
host: "127.0.0.1"
port: 9000
proxy-url: "socks5://127.0.0.1:1080"
retry:
  max-attempts: 3
  retry-statuses: [503, 429, 503]
conversations:
  idle-ttl-secs: 60
rate-limit:
  enabled: true
  requests-per-minute: 20
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_factor, 2);
        assert_eq!(config.retry.retry_statuses, vec![429, 503]);
        assert_eq!(config.conversations.idle_ttl_secs, 60);
        assert_eq!(config.conversations.max_entries, 10_000);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests_per_minute, 20);
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let err = Config::from_yaml("retry:\n  max-attempts: 0\n").unwrap_err();
        assert!(err.to_string().contains("max-attempts"));
    }

    #[test]
    fn test_validation_rejects_bad_proxy() {
        assert!(Config::from_yaml("proxy-url: \"ftp://proxy:21\"\n").is_err());
        let cfg = Config::from_yaml("proxy-url: \"  \"\n").unwrap();
        assert!(cfg.proxy_url.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "port: 7000\nupstream:\n  url: \" http://localhost:9/x \"\n")
            .unwrap();
        let cfg = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.upstream.url, "http://localhost:9/x");
    }
}
