//! Yahoo Finance quote adapter (stocks, indices, Indian exchanges)

use crate::config::ProviderConfig;
use crate::market::provider::check_status;
use crate::market::{MarketDataProvider, MarketKind, MarketQuote, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;

pub const NAME: &str = "yahoo_finance";
const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_RPM: u32 = 60;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<YahooQuote>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooQuote {
    symbol: String,
    regular_market_price: Option<f64>,
    regular_market_change_percent: Option<f64>,
    regular_market_volume: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    market_cap: Option<f64>,
}

pub struct YahooFinance {
    client: reqwest::Client,
    base_url: String,
    requests_per_minute: u32,
}

impl YahooFinance {
    pub fn new(client: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            requests_per_minute: config.requests_per_minute.unwrap_or(DEFAULT_RPM),
        }
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinance {
    fn name(&self) -> &str {
        NAME
    }

    fn supports(&self, kind: MarketKind) -> bool {
        matches!(kind, MarketKind::Stock | MarketKind::Index)
    }

    fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    fn prefers(&self, symbol: &str) -> bool {
        symbol.ends_with(".NS") || symbol.ends_with(".BO")
    }

    async fn fetch(&self, _kind: MarketKind, symbol: &str) -> Result<MarketQuote, ProviderError> {
        let url = format!("{}/v7/finance/quote", self.base_url);
        let response = self.client.get(&url).query(&[("symbols", symbol)]).send().await?;
        let envelope: QuoteEnvelope = check_status(response)?.json().await?;

        let quote = envelope
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;
        let price = quote
            .regular_market_price
            .ok_or_else(|| ProviderError::Rejected(format!("no price for {}", quote.symbol)))?;

        Ok(MarketQuote {
            symbol: symbol.to_string(),
            price,
            change_percent: quote.regular_market_change_percent,
            volume: quote.regular_market_volume,
            high_24h: quote.regular_market_day_high,
            low_24h: quote.regular_market_day_low,
            market_cap: quote.market_cap,
            provider: NAME.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> YahooFinance {
        let config = ProviderConfig {
            base_url: Some(server.uri()),
            ..ProviderConfig::default()
        };
        YahooFinance::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn test_normalizes_quote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("symbols", "AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteResponse": {
                    "result": [{
                        "symbol": "AAPL",
                        "regularMarketPrice": 189.5,
                        "regularMarketChangePercent": -0.42,
                        "regularMarketVolume": 51234000,
                        "regularMarketDayHigh": 191.0,
                        "regularMarketDayLow": 188.2,
                        "marketCap": 2950000000000.0
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let quote = adapter(&server).fetch(MarketKind::Stock, "AAPL").await.unwrap();
        assert_eq!(quote.price, 189.5);
        assert_eq!(quote.change_percent, Some(-0.42));
        assert_eq!(quote.volume, Some(51234000.0));
        assert_eq!(quote.high_24h, Some(191.0));
        assert_eq!(quote.provider, NAME);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteResponse": { "result": [], "error": null }
            })))
            .mount(&server)
            .await;

        let err = adapter(&server).fetch(MarketKind::Stock, "ZZZZ").await.unwrap_err();
        assert_eq!(err, ProviderError::NotFound("ZZZZ".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = adapter(&server).fetch(MarketKind::Stock, "AAPL").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_prefers_indian_exchanges() {
        let yahoo = YahooFinance::new(reqwest::Client::new(), &ProviderConfig::default());
        assert!(yahoo.prefers("RELIANCE.NS"));
        assert!(yahoo.prefers("TCS.BO"));
        assert!(!yahoo.prefers("AAPL"));
        assert!(!yahoo.supports(MarketKind::Crypto));
    }
}
