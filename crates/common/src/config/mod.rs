//! Configuration management for FinGraph services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values, so an empty environment still yields a runnable service

use crate::market::MarketKind;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Knowledge graph and inference configuration
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Quote cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Market data provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Inbound rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KnowledgeConfig {
    /// JSON concept file; the builtin financial knowledge base is used when unset
    pub concepts_path: Option<String>,

    /// Rule file; the builtin rule set is used when unset
    pub rules_path: Option<String>,

    /// Neighbor traversal depth used during retrieval
    #[serde(default = "default_neighbor_depth")]
    pub neighbor_depth: usize,

    /// Hard cap on forward-chaining rounds
    #[serde(default = "default_max_iterations")]
    pub max_inference_iterations: usize,

    /// Hard cap on derived facts per inference run
    #[serde(default = "default_max_derived")]
    pub max_derived_facts: usize,

    /// Maximum number of facts handed to the language model
    #[serde(default = "default_max_context_facts")]
    pub max_context_facts: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Maximum in-memory entries before oldest-fetched eviction
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Freshness windows per market kind
    #[serde(default)]
    pub ttl: CacheTtlConfig,

    /// Serve an expired entry flagged `stale` when every provider fails
    #[serde(default = "default_enabled")]
    pub serve_stale: bool,

    /// Optional persistence backend
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheTtlConfig {
    #[serde(default = "default_stock_ttl")]
    pub stock_secs: u64,
    #[serde(default = "default_crypto_ttl")]
    pub crypto_secs: u64,
    #[serde(default = "default_forex_ttl")]
    pub forex_secs: u64,
    #[serde(default = "default_index_ttl")]
    pub index_secs: u64,
}

impl CacheTtlConfig {
    /// Freshness window for a market kind
    pub fn secs_for(&self, kind: MarketKind) -> u64 {
        match kind {
            MarketKind::Stock => self.stock_secs,
            MarketKind::Crypto => self.crypto_secs,
            MarketKind::Forex => self.forex_secs,
            MarketKind::Index => self.index_secs,
        }
    }
}

/// Where cache entries survive restarts
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    #[default]
    None,
    File,
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,

    /// Directory for the file backend
    #[serde(default = "default_cache_dir")]
    pub file_dir: String,

    /// Redis URL for the redis backend
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Key prefix for namespacing in Redis
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// How long persisted records are retained after their freshness window
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    /// Per-attempt timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub request_timeout_secs: u64,

    /// Retries on transient failure within one provider attempt
    #[serde(default = "default_provider_retries")]
    pub max_retries: u32,

    /// Initial backoff between retries in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default)]
    pub yahoo_finance: ProviderConfig,

    #[serde(default)]
    pub alpha_vantage: ProviderConfig,

    #[serde(default)]
    pub coingecko: ProviderConfig,
}

/// Settings for one market data provider. Unset values fall back to the
/// adapter's own defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub requests_per_minute: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Model provider: openai, offline
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Chat completions endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// API key; the offline model is used when absent
    pub api_key: Option<String>,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_enabled")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 60 }
fn default_neighbor_depth() -> usize { 1 }
fn default_max_iterations() -> usize { 10 }
fn default_max_derived() -> usize { 256 }
fn default_max_context_facts() -> usize { 12 }
fn default_max_entries() -> usize { 1024 }
fn default_stock_ttl() -> u64 { 300 }
fn default_crypto_ttl() -> u64 { 120 }
fn default_forex_ttl() -> u64 { 3600 }
fn default_index_ttl() -> u64 { 600 }
fn default_cache_dir() -> String { ".cache/quotes".to_string() }
fn default_redis_url() -> String { "redis://localhost:6379".to_string() }
fn default_key_prefix() -> String { "fingraph".to_string() }
fn default_retention() -> u64 { 86400 }
fn default_provider_timeout() -> u64 { 10 }
fn default_provider_retries() -> u32 { 3 }
fn default_retry_delay() -> u64 { 200 }
fn default_llm_provider() -> String { "openai".to_string() }
fn default_llm_endpoint() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_timeout() -> u64 { 30 }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> usize { 1000 }
fn default_log_level() -> String { "info".to_string() }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "fingraph".to_string() }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__PROVIDERS__COINGECKO__REQUESTS_PER_MINUTE=10
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Per-attempt provider timeout
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.providers.request_timeout_secs)
    }

    /// Language model call timeout
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            concepts_path: None,
            rules_path: None,
            neighbor_depth: default_neighbor_depth(),
            max_inference_iterations: default_max_iterations(),
            max_derived_facts: default_max_derived(),
            max_context_facts: default_max_context_facts(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl: CacheTtlConfig::default(),
            serve_stale: default_enabled(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            stock_secs: default_stock_ttl(),
            crypto_secs: default_crypto_ttl(),
            forex_secs: default_forex_ttl(),
            index_secs: default_index_ttl(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::None,
            file_dir: default_cache_dir(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            retention_secs: default_retention(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_provider_timeout(),
            max_retries: default_provider_retries(),
            retry_base_delay_ms: default_retry_delay(),
            yahoo_finance: ProviderConfig::default(),
            alpha_vantage: ProviderConfig::default(),
            coingecko: ProviderConfig::default(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: None,
            api_key: None,
            requests_per_minute: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            endpoint: default_llm_endpoint(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_enabled(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.knowledge.neighbor_depth, 1);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.cache.persistence.backend, PersistenceBackend::None);
    }

    #[test]
    fn test_ttl_per_kind() {
        let ttl = CacheTtlConfig::default();
        assert_eq!(ttl.secs_for(MarketKind::Stock), 300);
        assert_eq!(ttl.secs_for(MarketKind::Crypto), 120);
        assert_eq!(ttl.secs_for(MarketKind::Forex), 3600);
        assert_eq!(ttl.secs_for(MarketKind::Index), 600);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[cache]\nmax_entries = 16\n\n[cache.persistence]\nbackend = \"file\"\n\n[providers.coingecko]\nrequests_per_minute = 5"
        )
        .unwrap();

        let config = AppConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.cache.max_entries, 16);
        assert_eq!(config.cache.persistence.backend, PersistenceBackend::File);
        assert_eq!(config.cache.ttl.stock_secs, 300);
        assert_eq!(config.providers.coingecko.requests_per_minute, Some(5));
        assert!(config.providers.coingecko.enabled);
        assert_eq!(config.server.port, 8080);
    }
}
