//! Market Data Service - cache, provider priority, retry and fallback
//!
//! Per request: a fresh cache entry is returned immediately. Otherwise
//! providers are tried in priority order; a provider whose rate window is
//! full is skipped, a failing one is retried on transient errors and then
//! abandoned for this request. Every retry spends a token from the same rate
//! window as the first call. The first success is cached and returned.
//! When every provider is skipped or fails, an expired entry may be served
//! with `stale = true`; otherwise the caller gets `UnknownSymbol` if every
//! provider reported the symbol missing, or `AllProvidersExhausted`.
//!
//! Concurrent misses for the same key may both call providers; the cache
//! keeps whichever write completes last.

use super::providers::build_providers;
use super::{
    normalize_symbol, CacheKey, FixedWindowLimiter, Lookup, MarketData, MarketDataProvider, MarketKind,
    MarketQuote, ProviderAttempt, ProviderError, QuoteCache,
};
use crate::cache::open_store;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use backoff::ExponentialBackoffBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct MarketDataServiceConfig {
    /// Bound on each provider call
    pub request_timeout: Duration,

    /// Retries after the first call, transient failures only
    pub max_retries: u32,

    /// First backoff interval between retries
    pub retry_base_delay: Duration,

    /// Serve an expired entry when every provider fails
    pub serve_stale: bool,
}

impl Default for MarketDataServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
            serve_stale: true,
        }
    }
}

impl From<&AppConfig> for MarketDataServiceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            request_timeout: config.provider_timeout(),
            max_retries: config.providers.max_retries,
            retry_base_delay: Duration::from_millis(config.providers.retry_base_delay_ms),
            serve_stale: config.cache.serve_stale,
        }
    }
}

struct ProviderSlot {
    provider: Arc<dyn MarketDataProvider>,
    limiter: FixedWindowLimiter,
}

pub struct MarketDataService {
    providers: Vec<ProviderSlot>,
    cache: Arc<QuoteCache>,
    config: MarketDataServiceConfig,
}

impl MarketDataService {
    /// `providers` are in default priority order
    pub fn new(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        cache: Arc<QuoteCache>,
        clock: Arc<dyn Clock>,
        config: MarketDataServiceConfig,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| ProviderSlot {
                limiter: FixedWindowLimiter::per_minute(provider.requests_per_minute(), Arc::clone(&clock)),
                provider,
            })
            .collect();

        Self {
            providers,
            cache,
            config,
        }
    }

    /// Wire adapters, cache and persistence from configuration
    pub async fn from_config(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let providers = build_providers(&config.providers)?;

        let mut cache = QuoteCache::new(&config.cache, Arc::clone(&clock));
        if let Some(store) = open_store(&config.cache.persistence).await? {
            cache = cache.with_store(store);
        }

        info!(
            providers = providers.len(),
            max_entries = config.cache.max_entries,
            serve_stale = config.cache.serve_stale,
            "Market data service ready"
        );

        Ok(Self::new(providers, Arc::new(cache), clock, MarketDataServiceConfig::from(config)))
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|s| s.provider.name()).collect()
    }

    /// Quote for `symbol`, optionally trying `preferred` provider first
    #[instrument(skip(self), fields(symbol = %raw_symbol))]
    pub async fn get_market_data(
        &self,
        kind: MarketKind,
        raw_symbol: &str,
        preferred: Option<&str>,
    ) -> Result<MarketData> {
        let symbol = normalize_symbol(kind, raw_symbol)?;
        if let Some(name) = preferred {
            if !self.providers.iter().any(|s| s.provider.name() == name) {
                return Err(AppError::Validation {
                    message: format!("unknown provider '{}'", name),
                    field: Some("provider".to_string()),
                });
            }
        }

        let key = CacheKey::new(kind, symbol.clone());
        let stale = match self.cache.lookup(&key).await {
            Lookup::Fresh(entry) => return Ok(MarketData::from_entry(&entry, false)),
            Lookup::Stale(entry) => Some(entry),
            Lookup::Missing => None,
        };

        let mut attempts = Vec::new();
        let mut not_found = 0;
        for slot in self.ordered(kind, &symbol, preferred) {
            let name = slot.provider.name();

            if !slot.provider.supports(kind) {
                attempts.push(ProviderAttempt::unsupported(name));
                continue;
            }
            if !slot.limiter.try_acquire() {
                debug!(provider = %name, limit = slot.limiter.limit(), "Provider rate window full, skipping");
                metrics::record_provider(name, "skipped", Duration::ZERO);
                attempts.push(ProviderAttempt::skipped(name));
                continue;
            }

            let started = Instant::now();
            match self.fetch_with_retry(slot, kind, &symbol).await {
                Ok(quote) => {
                    metrics::record_provider(name, "success", started.elapsed());
                    let entry = self.cache.insert(key, quote).await;
                    debug!(provider = %name, price = entry.quote.price, "Quote fetched");
                    return Ok(MarketData::from_entry(&entry, false));
                }
                Err(e) => {
                    metrics::record_provider(name, "failure", started.elapsed());
                    warn!(provider = %name, error = %e, "Provider failed, trying next");
                    if matches!(e, ProviderError::NotFound(_)) {
                        not_found += 1;
                    }
                    attempts.push(ProviderAttempt::failed(name, e.to_string()));
                }
            }
        }

        match stale {
            Some(entry) if self.config.serve_stale => {
                warn!(
                    kind = %kind,
                    symbol = %symbol,
                    fetched_at = %entry.fetched_at,
                    "All providers exhausted, serving stale quote"
                );
                Ok(MarketData::from_entry(&entry, true))
            }
            _ if not_found > 0 && not_found == attempts.len() => Err(AppError::UnknownSymbol {
                kind: kind.to_string(),
                symbol,
            }),
            _ => Err(AppError::AllProvidersExhausted {
                kind: kind.to_string(),
                symbol,
                attempts,
            }),
        }
    }

    /// Preferred provider first, then providers that claim the symbol, then
    /// the rest; unsupported providers are dropped unless explicitly preferred.
    fn ordered(&self, kind: MarketKind, symbol: &str, preferred: Option<&str>) -> Vec<&ProviderSlot> {
        let mut slots: Vec<&ProviderSlot> = self
            .providers
            .iter()
            .filter(|s| s.provider.supports(kind) || Some(s.provider.name()) == preferred)
            .collect();

        // stable: keeps registration order within each rank
        slots.sort_by_key(|s| {
            if Some(s.provider.name()) == preferred {
                0
            } else if s.provider.prefers(symbol) {
                1
            } else {
                2
            }
        });
        slots
    }

    /// The caller has already taken the token for the first call
    async fn fetch_with_retry(
        &self,
        slot: &ProviderSlot,
        kind: MarketKind,
        symbol: &str,
    ) -> std::result::Result<MarketQuote, ProviderError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.retry_base_delay)
            .with_max_interval(self.config.retry_base_delay * 8)
            .with_max_elapsed_time(None)
            .build();
        let max_attempts = self.config.max_retries + 1;
        let timeout = self.config.request_timeout;
        let provider = slot.provider.as_ref();
        let limiter = &slot.limiter;
        let mut attempt = 0u32;

        backoff::future::retry(policy, || {
            attempt += 1;
            let current = attempt;
            async move {
                let result = match tokio::time::timeout(timeout, provider.fetch(kind, symbol)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout),
                };

                result.map_err(|e| {
                    if !e.is_transient() || current >= max_attempts {
                        return backoff::Error::permanent(e);
                    }
                    if !limiter.try_acquire() {
                        debug!(provider = %provider.name(), attempt = current, "Rate window full, not retrying");
                        return backoff::Error::permanent(e);
                    }
                    debug!(provider = %provider.name(), attempt = current, error = %e, "Retrying provider");
                    backoff::Error::transient(e)
                })
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider that replays scripted results and counts calls
    struct Scripted {
        name: &'static str,
        kinds: Vec<MarketKind>,
        rpm: u32,
        prefers_suffix: Option<&'static str>,
        script: Mutex<Vec<std::result::Result<f64, ProviderError>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(name: &'static str, script: Vec<std::result::Result<f64, ProviderError>>) -> Self {
            Self {
                name,
                kinds: vec![MarketKind::Stock, MarketKind::Crypto],
                rpm: 100,
                prefers_suffix: None,
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn supports(&self, kind: MarketKind) -> bool {
            self.kinds.contains(&kind)
        }

        fn requests_per_minute(&self) -> u32 {
            self.rpm
        }

        fn prefers(&self, symbol: &str) -> bool {
            self.prefers_suffix.is_some_and(|s| symbol.ends_with(s))
        }

        async fn fetch(&self, _kind: MarketKind, symbol: &str) -> std::result::Result<MarketQuote, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.remove(0)
                } else {
                    script[0].clone()
                }
            };
            next.map(|price| MarketQuote::new(symbol, price, self.name))
        }
    }

    fn fast_config() -> MarketDataServiceConfig {
        MarketDataServiceConfig {
            request_timeout: Duration::from_secs(1),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(1),
            serve_stale: true,
        }
    }

    fn service(providers: Vec<Arc<Scripted>>, clock: Arc<ManualClock>) -> MarketDataService {
        let cache = Arc::new(QuoteCache::new(&CacheConfig::default(), clock.clone()));
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn MarketDataProvider>)
            .collect();
        MarketDataService::new(providers, cache, clock, fast_config())
    }

    #[tokio::test]
    async fn test_fresh_hit_skips_providers() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new("a", vec![Ok(10.0)]));
        let svc = service(vec![a.clone()], clock.clone());

        svc.get_market_data(MarketKind::Stock, "aapl", None).await.unwrap();
        clock.advance(chrono::Duration::seconds(1));
        let second = svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap();

        assert_eq!(a.calls(), 1);
        assert_eq!(second.quote.price, 10.0);
        assert!(!second.stale);
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new(
            "a",
            vec![Err(ProviderError::Transient("reset".into())), Ok(42.0)],
        ));
        let svc = service(vec![a.clone()], clock);

        let data = svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap();
        assert_eq!(data.quote.price, 42.0);
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new("a", vec![Err(ProviderError::Timeout)]));
        let svc = service(vec![a.clone()], clock);

        let err = svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap_err();
        assert!(matches!(err, AppError::AllProvidersExhausted { .. }));
        // first call plus max_retries
        assert_eq!(a.calls(), 3);
    }

    #[tokio::test]
    async fn test_rejection_not_retried() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new("a", vec![Err(ProviderError::Rejected("bad key".into()))]));
        let b = Arc::new(Scripted::new("b", vec![Ok(7.0)]));
        let svc = service(vec![a.clone(), b.clone()], clock);

        let data = svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap();
        assert_eq!(data.quote.provider, "b");
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_served_when_exhausted() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new(
            "a",
            vec![Ok(100.0), Err(ProviderError::Rejected("down".into()))],
        ));
        let svc = service(vec![a.clone()], clock.clone());

        svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap();
        clock.advance(chrono::Duration::seconds(301));

        let data = svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap();
        assert!(data.stale);
        assert_eq!(data.quote.price, 100.0);
    }

    #[tokio::test]
    async fn test_no_stale_when_disabled() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new(
            "a",
            vec![Ok(100.0), Err(ProviderError::Rejected("down".into()))],
        ));
        let cache = Arc::new(QuoteCache::new(&CacheConfig::default(), clock.clone()));
        let svc = MarketDataService::new(
            vec![a as Arc<dyn MarketDataProvider>],
            cache,
            clock.clone(),
            MarketDataServiceConfig {
                serve_stale: false,
                ..fast_config()
            },
        );

        svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap();
        clock.advance(chrono::Duration::seconds(301));

        match svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap_err() {
            AppError::AllProvidersExhausted { attempts, .. } => {
                assert_eq!(attempts, vec![ProviderAttempt::failed("a", "rejected: down")]);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_preferred_and_exchange_ordering() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new("a", vec![Ok(1.0)]));
        let mut b = Scripted::new("b", vec![Ok(2.0)]);
        b.prefers_suffix = Some(".NS");
        let b = Arc::new(b);
        let svc = service(vec![a.clone(), b.clone()], clock);

        let indian = svc.get_market_data(MarketKind::Stock, "reliance.ns", None).await.unwrap();
        assert_eq!(indian.quote.provider, "b");

        let preferred = svc.get_market_data(MarketKind::Stock, "MSFT", Some("b")).await.unwrap();
        assert_eq!(preferred.quote.provider, "b");

        let default = svc.get_market_data(MarketKind::Stock, "GOOG", None).await.unwrap();
        assert_eq!(default.quote.provider, "a");
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_kind_and_unknown_provider() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new("a", vec![Ok(1.0)]));
        let svc = service(vec![a.clone()], clock);

        match svc.get_market_data(MarketKind::Forex, "EUR/USD", Some("a")).await.unwrap_err() {
            AppError::AllProvidersExhausted { attempts, .. } => {
                assert_eq!(attempts, vec![ProviderAttempt::unsupported("a")]);
            }
            other => panic!("unexpected error {:?}", other),
        }

        let err = svc.get_market_data(MarketKind::Stock, "AAPL", Some("nope")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn test_retries_spend_rate_window() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut a = Scripted::new("a", vec![Err(ProviderError::Transient("reset".into()))]);
        a.rpm = 1;
        let a = Arc::new(a);
        let b = Arc::new(Scripted::new("b", vec![Ok(5.0)]));
        let svc = service(vec![a.clone(), b.clone()], clock);

        let data = svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap();
        assert_eq!(data.quote.provider, "b");
        // the only token went to the first call
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_rate_limit_moves_on() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new("a", vec![Err(ProviderError::RateLimited)]));
        let b = Arc::new(Scripted::new("b", vec![Ok(5.0)]));
        let svc = service(vec![a.clone(), b.clone()], clock);

        let data = svc.get_market_data(MarketKind::Stock, "AAPL", None).await.unwrap();
        assert_eq!(data.quote.provider, "b");
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn test_symbol_missing_everywhere_is_unknown() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let a = Arc::new(Scripted::new("a", vec![Err(ProviderError::NotFound("ZZZZ".into()))]));
        let b = Arc::new(Scripted::new("b", vec![Err(ProviderError::NotFound("ZZZZ".into()))]));
        let svc = service(vec![a.clone(), b.clone()], clock.clone());

        let err = svc.get_market_data(MarketKind::Stock, "ZZZZ", None).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::UnknownSymbol { ref kind, ref symbol } if kind == "stock" && symbol == "ZZZZ"
        ));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

        // one provider failing for another reason keeps it an outage
        let c = Arc::new(Scripted::new("c", vec![Err(ProviderError::NotFound("ZZZZ".into()))]));
        let d = Arc::new(Scripted::new("d", vec![Err(ProviderError::Rejected("down".into()))]));
        let svc = service(vec![c, d], clock);
        let err = svc.get_market_data(MarketKind::Stock, "ZZZZ", None).await.unwrap_err();
        assert!(matches!(err, AppError::AllProvidersExhausted { .. }));
    }
}
