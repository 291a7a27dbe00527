//! Market data layer
//!
//! Provides:
//! - Provider adapters behind one `MarketDataProvider` interface
//! - Per-provider fixed-window rate limiting
//! - TTL quote cache with optional persistence
//! - `MarketDataService`: cache, priority order, retry and fallback

mod cache;
mod provider;
pub mod providers;
mod rate_limit;
mod service;

pub use cache::{CacheEntry, CacheKey, Lookup, QuoteCache};
pub use provider::{MarketDataProvider, ProviderError};
pub use rate_limit::FixedWindowLimiter;
pub use service::{MarketDataService, MarketDataServiceConfig};

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of instrument a symbol names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Stock,
    Crypto,
    Forex,
    Index,
}

impl MarketKind {
    pub const ALL: [MarketKind; 4] = [MarketKind::Stock, MarketKind::Crypto, MarketKind::Forex, MarketKind::Index];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketKind::Stock => "stock",
            MarketKind::Crypto => "crypto",
            MarketKind::Forex => "forex",
            MarketKind::Index => "index",
        }
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" | "stocks" | "equity" => Ok(MarketKind::Stock),
            "crypto" | "cryptocurrency" => Ok(MarketKind::Crypto),
            "forex" | "fx" | "currency" => Ok(MarketKind::Forex),
            "index" | "indices" => Ok(MarketKind::Index),
            other => Err(AppError::Validation {
                message: format!("unknown market kind '{}'", other),
                field: Some("kind".to_string()),
            }),
        }
    }
}

/// Quote normalized from any provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub symbol: String,
    pub price: f64,
    pub change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub market_cap: Option<f64>,
    /// Provider that produced the quote
    pub provider: String,
}

impl MarketQuote {
    pub fn new(symbol: impl Into<String>, price: f64, provider: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change_percent: None,
            volume: None,
            high_24h: None,
            low_24h: None,
            market_cap: None,
            provider: provider.into(),
        }
    }
}

/// Answer to `get_market_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(flatten)]
    pub quote: MarketQuote,
    pub fetched_at: DateTime<Utc>,
    /// Served from an expired cache entry after every provider failed
    pub stale: bool,
}

impl MarketData {
    pub fn from_entry(entry: &CacheEntry, stale: bool) -> Self {
        Self {
            quote: entry.quote.clone(),
            fetched_at: entry.fetched_at,
            stale,
        }
    }
}

/// What happened to one provider during a fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    SkippedRateLimited,
    Failed { message: String },
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl ProviderAttempt {
    pub fn skipped(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            outcome: AttemptOutcome::SkippedRateLimited,
        }
    }

    pub fn failed(provider: &str, message: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            outcome: AttemptOutcome::Failed {
                message: message.into(),
            },
        }
    }

    pub fn unsupported(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            outcome: AttemptOutcome::Unsupported,
        }
    }
}

const CRYPTO_NAMES: &[(&str, &str)] = &[
    ("BITCOIN CASH", "BCH"),
    ("BITCOIN", "BTC"),
    ("ETHEREUM", "ETH"),
    ("SOLANA", "SOL"),
    ("DOGECOIN", "DOGE"),
    ("CARDANO", "ADA"),
    ("RIPPLE", "XRP"),
    ("POLKADOT", "DOT"),
    ("LITECOIN", "LTC"),
    ("BINANCE COIN", "BNB"),
];

/// Canonical cache/provider form of a user-supplied symbol: trimmed, `$`
/// stripped, uppercased, crypto names mapped to tickers.
pub fn normalize_symbol(kind: MarketKind, raw: &str) -> Result<String> {
    let symbol = raw.trim().trim_start_matches('$').trim().to_uppercase();

    if symbol.is_empty() {
        return Err(AppError::Validation {
            message: "symbol must not be empty".to_string(),
            field: Some("symbol".to_string()),
        });
    }
    if symbol.len() > 32 || symbol.chars().any(|c| c.is_control()) {
        return Err(AppError::Validation {
            message: format!("invalid symbol '{}'", raw.trim()),
            field: Some("symbol".to_string()),
        });
    }

    if kind == MarketKind::Crypto {
        if let Some((_, ticker)) = CRYPTO_NAMES.iter().find(|(name, _)| *name == symbol) {
            return Ok(ticker.to_string());
        }
    }

    Ok(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_normalize_symbol() {
        assert_eq!(normalize_symbol(MarketKind::Stock, "  $aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol(MarketKind::Crypto, "Bitcoin").unwrap(), "BTC");
        assert_eq!(normalize_symbol(MarketKind::Crypto, "bitcoin cash").unwrap(), "BCH");
        assert_eq!(normalize_symbol(MarketKind::Stock, "reliance.ns").unwrap(), "RELIANCE.NS");
        // names only map for crypto
        assert_eq!(normalize_symbol(MarketKind::Stock, "bitcoin").unwrap(), "BITCOIN");
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let err = assert_err!(normalize_symbol(MarketKind::Stock, " $ "));
        assert!(matches!(err, AppError::Validation { .. }));
        assert_err!(normalize_symbol(MarketKind::Stock, &"X".repeat(40)));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(assert_ok!("Crypto".parse::<MarketKind>()), MarketKind::Crypto);
        assert_eq!(assert_ok!("indices".parse::<MarketKind>()), MarketKind::Index);
        assert_err!("bonds".parse::<MarketKind>());
    }

    #[test]
    fn test_attempt_serialization() {
        let json = serde_json::to_value(ProviderAttempt::failed("coingecko", "timeout")).unwrap();
        assert_eq!(json["provider"], "coingecko");
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["message"], "timeout");
    }
}
