//! Provider adapter interface

use super::{MarketKind, MarketQuote};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use thiserror::Error;

/// Failure of a single provider call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure or upstream 5xx; worth retrying
    #[error("transient failure: {0}")]
    Transient(String),

    /// Upstream answered 429; retrying inside the same request only burns quota
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    /// Well-formed refusal or unusable payload; retrying will not help
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("symbol not found: {0}")]
    NotFound(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_) | ProviderError::Timeout)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::Rejected(format!("malformed response: {}", err))
        } else {
            ProviderError::Transient(err.to_string())
        }
    }
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(match status {
        StatusCode::NOT_FOUND => ProviderError::NotFound(response.url().path().to_string()),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        s if s.is_server_error() => ProviderError::Transient(format!("upstream status {}", s)),
        s => ProviderError::Rejected(format!("upstream status {}", s)),
    })
}

/// One external market data source, normalized to `MarketQuote`
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Stable identifier used in config, metrics and attempt reports
    fn name(&self) -> &str;

    fn supports(&self, kind: MarketKind) -> bool;

    /// Fixed-window budget per 60 seconds
    fn requests_per_minute(&self) -> u32;

    /// Symbols this provider should be tried first for
    fn prefers(&self, _symbol: &str) -> bool {
        false
    }

    /// Fetch one quote; `symbol` is already normalized
    async fn fetch(&self, kind: MarketKind, symbol: &str) -> Result<MarketQuote, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Transient("reset".into()).is_transient());
        assert!(!ProviderError::Rejected("bad key".into()).is_transient());
        assert!(!ProviderError::NotFound("ZZZZ".into()).is_transient());
        assert!(!ProviderError::RateLimited.is_transient());
    }
}
