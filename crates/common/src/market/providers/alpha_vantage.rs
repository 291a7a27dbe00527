//! Alpha Vantage adapter (stocks via GLOBAL_QUOTE, forex via CURRENCY_EXCHANGE_RATE)

use super::parse_number;
use crate::config::ProviderConfig;
use crate::market::provider::check_status;
use crate::market::{MarketDataProvider, MarketKind, MarketQuote, ProviderError};
use async_trait::async_trait;
use serde_json::Value;

pub const NAME: &str = "alpha_vantage";
const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
const DEFAULT_RPM: u32 = 5;

pub struct AlphaVantage {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    requests_per_minute: u32,
}

impl AlphaVantage {
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

    async fn query(&self, params: &[(&str, &str)]) -> Result<Value, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Rejected("no API key configured".to_string()))?;

        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await?;
        let body: Value = check_status(response)?.json().await?;

        // throttling and key problems come back as 200 with a message
        for field in ["Note", "Information", "Error Message"] {
            if let Some(message) = body.get(field).and_then(Value::as_str) {
                return Err(ProviderError::Rejected(message.to_string()));
            }
        }
        Ok(body)
    }

    async fn stock_quote(&self, symbol: &str) -> Result<MarketQuote, ProviderError> {
        let body = self.query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)]).await?;
        let quote = body
            .get("Global Quote")
            .and_then(Value::as_object)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;

        let field = |name: &str| quote.get(name).and_then(Value::as_str).and_then(parse_number);
        let price = field("05. price").ok_or_else(|| ProviderError::Rejected(format!("no price for {}", symbol)))?;

        Ok(MarketQuote {
            change_percent: field("10. change percent"),
            volume: field("06. volume"),
            high_24h: field("03. high"),
            low_24h: field("04. low"),
            ..MarketQuote::new(symbol, price, NAME)
        })
    }

    async fn exchange_rate(&self, symbol: &str) -> Result<MarketQuote, ProviderError> {
        let (from, to) = split_pair(symbol).ok_or_else(|| {
            ProviderError::Rejected(format!("'{}' is not a currency pair like EUR/USD", symbol))
        })?;
        let body = self
            .query(&[
                ("function", "CURRENCY_EXCHANGE_RATE"),
                ("from_currency", from),
                ("to_currency", to),
            ])
            .await?;

        let rate = body
            .get("Realtime Currency Exchange Rate")
            .and_then(|r| r.get("5. Exchange Rate"))
            .and_then(Value::as_str)
            .and_then(parse_number)
            .ok_or_else(|| ProviderError::NotFound(symbol.to_string()))?;

        Ok(MarketQuote::new(symbol, rate, NAME))
    }
}

/// `EUR/USD`, `EUR-USD` or `EURUSD`
fn split_pair(symbol: &str) -> Option<(&str, &str)> {
    if let Some(pair) = symbol.split_once(['/', '-']) {
        return Some(pair).filter(|(a, b)| !a.is_empty() && !b.is_empty());
    }
    (symbol.len() == 6 && symbol.is_ascii()).then(|| symbol.split_at(3))
}

#[async_trait]
impl MarketDataProvider for AlphaVantage {
    fn name(&self) -> &str {
        NAME
    }

    fn supports(&self, kind: MarketKind) -> bool {
        matches!(kind, MarketKind::Stock | MarketKind::Forex)
    }

    fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    async fn fetch(&self, kind: MarketKind, symbol: &str) -> Result<MarketQuote, ProviderError> {
        match kind {
            MarketKind::Forex => self.exchange_rate(symbol).await,
            _ => self.stock_quote(symbol).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer, api_key: Option<&str>) -> AlphaVantage {
        let config = ProviderConfig {
            base_url: Some(format!("{}/query", server.uri())),
            api_key: api_key.map(str::to_string),
            ..ProviderConfig::default()
        };
        AlphaVantage::new(reqwest::Client::new(), &config)
    }

    #[tokio::test]
    async fn test_global_quote() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("function", "GLOBAL_QUOTE"))
            .and(query_param("symbol", "IBM"))
            .and(query_param("apikey", "demo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Global Quote": {
                    "01. symbol": "IBM",
                    "03. high": "172.1000",
                    "04. low": "169.5500",
                    "05. price": "171.2400",
                    "06. volume": "3120411",
                    "10. change percent": "0.8123%"
                }
            })))
            .mount(&server)
            .await;

        let quote = adapter(&server, Some("demo")).fetch(MarketKind::Stock, "IBM").await.unwrap();
        assert_eq!(quote.price, 171.24);
        assert_eq!(quote.change_percent, Some(0.8123));
        assert_eq!(quote.low_24h, Some(169.55));
        assert_eq!(quote.market_cap, None);
    }

    #[tokio::test]
    async fn test_exchange_rate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("function", "CURRENCY_EXCHANGE_RATE"))
            .and(query_param("from_currency", "EUR"))
            .and(query_param("to_currency", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Realtime Currency Exchange Rate": { "5. Exchange Rate": "1.08420000" }
            })))
            .mount(&server)
            .await;

        let quote = adapter(&server, Some("demo")).fetch(MarketKind::Forex, "EUR/USD").await.unwrap();
        assert_eq!(quote.price, 1.0842);
        assert_eq!(quote.symbol, "EUR/USD");
    }

    #[tokio::test]
    async fn test_throttle_note_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."
            })))
            .mount(&server)
            .await;

        let err = adapter(&server, Some("demo")).fetch(MarketKind::Stock, "IBM").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_missing_key_rejected_without_request() {
        let server = MockServer::start().await;
        let err = adapter(&server, None).fetch(MarketKind::Stock, "IBM").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_split_pair() {
        assert_eq!(split_pair("EUR/USD"), Some(("EUR", "USD")));
        assert_eq!(split_pair("GBPJPY"), Some(("GBP", "JPY")));
        assert_eq!(split_pair("EURO"), None);
        assert_eq!(split_pair("/USD"), None);
    }
}
