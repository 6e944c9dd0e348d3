use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::cache::{CacheNamespace, CachedValue, QuoteCache};
use crate::errors::CoreError;
use crate::models::quote::{Quote, QuoteMetrics, QuoteSource, ResolvedQuote};
use crate::models::settings::TrackerSettings;
use crate::providers::traits::QuoteProvider;
use super::mock_quotes::MockQuoteGenerator;

/// Translate a ticker or BSE code into the symbol the provider expects.
///
/// - Already exchange-qualified (contains `.`): unchanged
/// - Purely numeric (BSE scrip code): `.BO` appended
/// - Anything else: `.NS` appended (NSE)
pub fn normalize_symbol(symbol: &str) -> String {
    let symbol = symbol.trim();
    if symbol.contains('.') {
        symbol.to_string()
    } else if !symbol.is_empty() && symbol.bytes().all(|b| b.is_ascii_digit()) {
        format!("{symbol}.BO")
    } else {
        format!("{symbol}.NS")
    }
}

/// TTLs used when a live quote is written to all three namespaces.
#[derive(Debug, Clone, Copy)]
pub struct LiveTtls {
    pub full: Duration,
    pub price: Duration,
    pub metrics: Duration,
}

impl LiveTtls {
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            full: ttl,
            price: ttl,
            metrics: ttl,
        }
    }
}

/// Adapter between the upstream quote provider and the rest of the core.
///
/// Never fails: every lookup yields a usable quote, in order of preference
/// 1. a fresh cache entry,
/// 2. a live fetch (bounded by the request timeout),
/// 3. the last cached real value for the symbol, ignoring expiry,
/// 4. a generated mock quote, cached for the short mock TTL.
///
/// The provider is attached once, possibly after construction. Until then the
/// service is "not ready" and every upstream attempt fails fast into the
/// fallback path.
pub struct QuoteService {
    provider: OnceCell<Arc<dyn QuoteProvider>>,
    cache: Arc<QuoteCache>,
    mocks: MockQuoteGenerator,
    settings: TrackerSettings,
}

impl QuoteService {
    /// Create a service with no provider attached yet.
    pub fn new(cache: Arc<QuoteCache>, settings: TrackerSettings) -> Self {
        Self::from_parts(cache, settings, None)
    }

    pub fn with_provider(
        cache: Arc<QuoteCache>,
        settings: TrackerSettings,
        provider: Arc<dyn QuoteProvider>,
    ) -> Self {
        Self::from_parts(cache, settings, Some(provider))
    }

    fn from_parts(
        cache: Arc<QuoteCache>,
        settings: TrackerSettings,
        provider: Option<Arc<dyn QuoteProvider>>,
    ) -> Self {
        Self {
            provider: OnceCell::new_with(provider),
            mocks: MockQuoteGenerator::new(settings.mock_seed),
            cache,
            settings,
        }
    }

    /// Attach the upstream provider. Only the first call succeeds.
    pub fn attach_provider(&self, provider: Arc<dyn QuoteProvider>) -> Result<(), CoreError> {
        let name = provider.name().to_string();
        self.provider.set(provider).map_err(|_| {
            CoreError::Config(format!(
                "A quote provider is already attached; refusing to replace it with {name}"
            ))
        })?;
        info!("Quote provider {name} attached");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.provider.initialized()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.get().map(|p| p.name())
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    // ── Single-symbol views ─────────────────────────────────────────

    /// Full quote for one symbol.
    pub async fn get_quote(&self, symbol: &str) -> Quote {
        if let Some(quote) = self.fresh_quote(symbol) {
            debug!("Cache hit for quote {symbol}");
            return quote;
        }
        self.resolve_and_store(symbol).await
    }

    /// Current market price only.
    pub async fn get_price(&self, symbol: &str) -> f64 {
        if let Some(price) = self
            .cache
            .get(&CacheNamespace::Price.key(symbol))
            .and_then(|v| v.as_price())
        {
            debug!("Cache hit for price {symbol}");
            return price;
        }
        if let Some(quote) = self.fresh_quote(symbol) {
            return quote.cmp;
        }
        self.resolve_and_store(symbol).await.cmp
    }

    /// P/E ratio, earnings and market cap only.
    pub async fn get_quote_metrics(&self, symbol: &str) -> QuoteMetrics {
        if let Some(metrics) = self
            .cache
            .get(&CacheNamespace::Metrics.key(symbol))
            .and_then(|v| v.as_metrics())
        {
            debug!("Cache hit for metrics {symbol}");
            return metrics;
        }
        if let Some(quote) = self.fresh_quote(symbol) {
            return quote.metrics();
        }
        self.resolve_and_store(symbol).await.metrics()
    }

    // ── Upstream resolution ─────────────────────────────────────────

    /// One upstream attempt for `symbol`, with stale and mock fallback.
    ///
    /// Live results are NOT cached here; the caller decides the TTLs (see
    /// [`QuoteService::store_live`]). Mock results are cached for the mock TTL.
    pub async fn resolve(&self, symbol: &str) -> ResolvedQuote {
        match self.fetch_live(symbol).await {
            Ok(quote) => ResolvedQuote {
                quote,
                source: QuoteSource::Live,
            },
            Err(e) => {
                warn!("Quote fetch for {symbol} failed: {e}");
                self.fallback(symbol)
            }
        }
    }

    /// Write a live quote to the full, price and metrics namespaces.
    pub fn store_live(&self, quote: &Quote, ttls: LiveTtls) {
        let symbol = &quote.symbol;
        self.cache.set(
            CacheNamespace::Full.key(symbol),
            CachedValue::Quote(quote.clone()),
            ttls.full,
        );
        self.cache.set(
            CacheNamespace::Price.key(symbol),
            CachedValue::Price(quote.cmp),
            ttls.price,
        );
        self.cache.set(
            CacheNamespace::Metrics.key(symbol),
            CachedValue::Metrics(quote.metrics()),
            ttls.metrics,
        );
    }

    async fn resolve_and_store(&self, symbol: &str) -> Quote {
        let resolved = self.resolve(symbol).await;
        if resolved.is_live() {
            self.store_live(
                &resolved.quote,
                LiveTtls {
                    full: self.settings.quote_ttl(),
                    price: self.settings.price_ttl(),
                    metrics: self.settings.metrics_ttl(),
                },
            );
        }
        resolved.quote
    }

    async fn fetch_live(&self, symbol: &str) -> Result<Quote, CoreError> {
        let provider = self.provider.get().ok_or(CoreError::ProviderNotReady)?;
        let provider_symbol = normalize_symbol(symbol);
        let timeout = self.settings.request_timeout();

        info!("Fetching quote for {symbol} ({provider_symbol}) from {}", provider.name());
        let raw = tokio::time::timeout(timeout, provider.fetch_quote(&provider_symbol))
            .await
            .map_err(|_| CoreError::Timeout {
                provider: provider.name().to_string(),
                millis: self.settings.request_timeout_ms,
            })??;

        let quote = raw.into_quote(symbol);
        if quote.cmp < 0.0 {
            return Err(CoreError::Api {
                provider: provider.name().to_string(),
                message: format!(
                    "Invalid price returned for {provider_symbol}: {} (must be non-negative)",
                    quote.cmp
                ),
            });
        }
        Ok(quote)
    }

    /// Stale real data if any was ever cached, else a fresh mock.
    fn fallback(&self, symbol: &str) -> ResolvedQuote {
        if let Some(quote) = self.stale_quote(symbol) {
            debug!("Serving stale quote for {symbol}");
            return ResolvedQuote {
                quote,
                source: QuoteSource::Stale,
            };
        }

        let quote = self.mocks.quote(symbol);
        warn!("No cached data for {symbol}; serving mock price {}", quote.cmp);
        self.cache.set(
            CacheNamespace::Full.key(symbol),
            CachedValue::Mock(quote.clone()),
            self.settings.mock_ttl(),
        );
        ResolvedQuote {
            quote,
            source: QuoteSource::Mock,
        }
    }

    /// Fresh full quote, or one assembled from fresh price and metrics entries.
    fn fresh_quote(&self, symbol: &str) -> Option<Quote> {
        if let Some(quote) = self
            .cache
            .get(&CacheNamespace::Full.key(symbol))
            .and_then(CachedValue::into_quote)
        {
            return Some(quote);
        }
        let price = self
            .cache
            .get(&CacheNamespace::Price.key(symbol))?
            .as_price()?;
        let metrics = self
            .cache
            .get(&CacheNamespace::Metrics.key(symbol))?
            .as_metrics()?;
        Some(Quote::from_parts(symbol, price, metrics))
    }

    /// Last real (non-mock) data for a symbol, ignoring expiry.
    fn stale_quote(&self, symbol: &str) -> Option<Quote> {
        let full = self
            .cache
            .get_stale(&CacheNamespace::Full.key(symbol))
            .filter(|v| !v.is_mock())
            .and_then(CachedValue::into_quote);
        if full.is_some() {
            return full;
        }

        let price = self
            .cache
            .get_stale(&CacheNamespace::Price.key(symbol))?
            .as_price()?;
        let metrics = self
            .cache
            .get_stale(&CacheNamespace::Metrics.key(symbol))
            .and_then(|v| v.as_metrics())
            .unwrap_or_default();
        Some(Quote::from_parts(symbol, price, metrics))
    }
}
