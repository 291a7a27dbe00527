//! CoinGecko simple-price adapter (crypto)

use crate::config::ProviderConfig;
use crate::market::provider::check_status;
use crate::market::{MarketDataProvider, MarketKind, MarketQuote, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

pub const NAME: &str = "coingecko";
const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_RPM: u32 = 30;

/// Ticker → CoinGecko coin id
const COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("DOGE", "dogecoin"),
    ("ADA", "cardano"),
    ("XRP", "ripple"),
    ("DOT", "polkadot"),
    ("LTC", "litecoin"),
    ("BNB", "binancecoin"),
    ("BCH", "bitcoin-cash"),
];

#[derive(Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
    usd_market_cap: Option<f64>,
    usd_24h_vol: Option<f64>,
    usd_24h_change: Option<f64>,
}

pub struct CoinGecko {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    requests_per_minute: u32,
}

impl CoinGecko {
    pub fn new(client: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
            requests_per_minute: config.requests_per_minute.unwrap_or(DEFAULT_RPM),
        }
    }

    /// Unknown tickers are passed through lowercased as the coin id
    fn coin_id(symbol: &str) -> String {
        COIN_IDS
            .iter()
            .find(|(ticker, _)| *ticker == symbol)
            .map(|(_, id)| id.to_string())
            .unwrap_or_else(|| symbol.to_lowercase())
    }
}

#[async_trait]
impl MarketDataProvider for CoinGecko {
    fn name(&self) -> &str {
        NAME
    }

    fn supports(&self, kind: MarketKind) -> bool {
        kind == MarketKind::Crypto
    }

    fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    async fn fetch(&self, _kind: MarketKind, symbol: &str) -> Result<MarketQuote, ProviderError> {
        let id = Self::coin_id(symbol);
        let mut request = self
            .client
            .get(format!("{}/simple/price", self.base_url))
            .query(&[
                ("ids", id.as_str()),
                ("vs_currencies", "usd"),
                ("include_market_cap", "true"),
                ("include_24hr_vol", "true"),
                ("include_24hr_change", "true"),
            ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let mut prices: HashMap<String, SimplePrice> = check_status(request.send().await?)?.json().await?;
        let coin = prices
            .remove(&id)
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;
        let price = coin
            .usd
            .ok_or_else(|| ProviderError::Rejected(format!("no USD price for {}", id)))?;

        Ok(MarketQuote {
            change_percent: coin.usd_24h_change,
            volume: coin.usd_24h_vol,
            market_cap: coin.usd_market_cap,
            ..MarketQuote::new(symbol, price, NAME)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> CoinGecko {
        let config = ProviderConfig {
            base_url: Some(server.uri()),
            ..ProviderConfig::default()
        };
        CoinGecko::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn test_simple_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "bitcoin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bitcoin": {
                    "usd": 67250.0,
                    "usd_market_cap": 1.32e12,
                    "usd_24h_vol": 2.8e10,
                    "usd_24h_change": 1.75
                }
            })))
            .mount(&server)
            .await;

        let quote = adapter(&server).fetch(MarketKind::Crypto, "BTC").await.unwrap();
        assert_eq!(quote.symbol, "BTC");
        assert_eq!(quote.price, 67250.0);
        assert_eq!(quote.change_percent, Some(1.75));
        assert_eq!(quote.market_cap, Some(1.32e12));
        assert_eq!(quote.high_24h, None);
    }

    #[tokio::test]
    async fn test_unknown_coin_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let err = adapter(&server).fetch(MarketKind::Crypto, "NOPE").await.unwrap_err();
        assert_eq!(err, ProviderError::NotFound("NOPE".to_string()));
    }

    #[tokio::test]
    async fn test_upstream_429_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = adapter(&server).fetch(MarketKind::Crypto, "ETH").await.unwrap_err();
        assert_eq!(err, ProviderError::RateLimited);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_coin_ids() {
        assert_eq!(CoinGecko::coin_id("BCH"), "bitcoin-cash");
        assert_eq!(CoinGecko::coin_id("PEPE"), "pepe");
    }
}
