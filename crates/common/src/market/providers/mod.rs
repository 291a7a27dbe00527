//! Provider adapters
//!
//! Registration order is the default priority: Yahoo Finance, Alpha Vantage,
//! CoinGecko. Each adapter only answers the kinds it supports, which yields
//! stocks → Yahoo then Alpha Vantage, index → Yahoo only, crypto →
//! CoinGecko, forex → Alpha Vantage.

mod alpha_vantage;
mod coingecko;
mod yahoo;

pub use alpha_vantage::AlphaVantage;
pub use coingecko::CoinGecko;
pub use yahoo::YahooFinance;

use super::MarketDataProvider;
use crate::config::ProvidersConfig;
use crate::errors::{AppError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared HTTP client for all adapters
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("fingraph/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Enabled adapters in priority order
pub fn build_providers(config: &ProvidersConfig) -> Result<Vec<Arc<dyn MarketDataProvider>>> {
    let client = http_client(Duration::from_secs(config.request_timeout_secs))?;
    let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();

    if config.yahoo_finance.enabled {
        providers.push(Arc::new(YahooFinance::new(client.clone(), &config.yahoo_finance)));
    }
    if config.alpha_vantage.enabled {
        providers.push(Arc::new(AlphaVantage::new(client.clone(), &config.alpha_vantage)));
    }
    if config.coingecko.enabled {
        providers.push(Arc::new(CoinGecko::new(client, &config.coingecko)));
    }

    info!(
        providers = ?providers.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
        "Market data providers registered"
    );
    Ok(providers)
}

/// Parse numbers that providers send as strings, e.g. `"1.2345%"`
pub(crate) fn parse_number(value: &str) -> Option<f64> {
    value.trim().trim_end_matches('%').trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketKind;

    #[test]
    fn test_default_priority() {
        let providers = build_providers(&ProvidersConfig::default()).unwrap();
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["yahoo_finance", "alpha_vantage", "coingecko"]);

        let supporting = |kind: MarketKind| -> Vec<&str> {
            providers.iter().filter(|p| p.supports(kind)).map(|p| p.name()).collect()
        };
        assert_eq!(supporting(MarketKind::Stock), vec!["yahoo_finance", "alpha_vantage"]);
        assert_eq!(supporting(MarketKind::Index), vec!["yahoo_finance"]);

        let crypto: Vec<&str> = providers
            .iter()
            .filter(|p| p.supports(MarketKind::Crypto))
            .map(|p| p.name())
            .collect();
        assert_eq!(crypto, vec!["coingecko"]);

        let forex: Vec<&str> = providers
            .iter()
            .filter(|p| p.supports(MarketKind::Forex))
            .map(|p| p.name())
            .collect();
        assert_eq!(forex, vec!["alpha_vantage"]);
    }

    #[test]
    fn test_disabled_provider_skipped() {
        let mut config = ProvidersConfig::default();
        config.alpha_vantage.enabled = false;
        let providers = build_providers(&config).unwrap();
        assert!(providers.iter().all(|p| p.name() != "alpha_vantage"));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("189.9800"), Some(189.98));
        assert_eq!(parse_number(" -1.2500% "), Some(-1.25));
        assert_eq!(parse_number("n/a"), None);
    }
}
