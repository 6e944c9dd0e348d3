pub mod cache;
pub mod clock;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use std::collections::HashMap;
use std::sync::Arc;

use cache::QuoteCache;
use clock::{Clock, SystemClock};
use errors::CoreError;
use models::{
    holding::Holding,
    portfolio::PortfolioSnapshot,
    quote::{Quote, QuoteMetrics},
    settings::TrackerSettings,
};
use providers::{traits::QuoteProvider, yahoo_finance::YahooFinanceProvider};
use services::{
    batch_service::BatchQuoteService,
    pacer::{Pacer, TokioPacer},
    portfolio_service::PortfolioService,
    quote_service::QuoteService,
    sector_classifier::{KeywordSectorClassifier, SectorClassifier},
};
use storage::holdings::HoldingsLoader;

/// Main entry point for the portfolio tracker core library.
/// Holds the static holdings and all services needed to serve live views of them.
///
/// Built once at startup through [`PortfolioTracker::builder`]; all request
/// operations take `&self`, so the tracker can be shared behind an `Arc`.
#[must_use]
pub struct PortfolioTracker {
    holdings: Vec<Holding>,
    cache: Arc<QuoteCache>,
    quote_service: Arc<QuoteService>,
    batch_service: BatchQuoteService,
    portfolio_service: PortfolioService,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("holdings", &self.holdings.len())
            .field("cached_entries", &self.cache.len())
            .field("provider", &self.quote_service.provider_name())
            .finish()
    }
}

impl PortfolioTracker {
    /// Start building a tracker over the given holdings.
    pub fn builder(holdings: Vec<Holding>) -> PortfolioTrackerBuilder {
        PortfolioTrackerBuilder::new(holdings)
    }

    /// Start building a tracker over holdings read from a JSON file.
    pub fn builder_from_file(path: &str) -> Result<PortfolioTrackerBuilder, CoreError> {
        Ok(PortfolioTrackerBuilder::new(HoldingsLoader::load_from_file(path)?))
    }

    // ── Provider Readiness ──────────────────────────────────────────

    /// Attach the upstream quote provider (once). Until a provider is
    /// attached, every quote comes from cache or the mock generator.
    pub fn attach_provider(&self, provider: Arc<dyn QuoteProvider>) -> Result<(), CoreError> {
        self.quote_service.attach_provider(provider)
    }

    #[must_use]
    pub fn is_provider_ready(&self) -> bool {
        self.quote_service.is_ready()
    }

    // ── Quotes ──────────────────────────────────────────────────────

    /// Live (or cached / fallback) quote for one symbol.
    pub async fn get_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let symbol = validate_symbol(symbol)?;
        Ok(self.quote_service.get_quote(symbol).await)
    }

    /// Current market price for one symbol.
    pub async fn get_price(&self, symbol: &str) -> Result<f64, CoreError> {
        let symbol = validate_symbol(symbol)?;
        Ok(self.quote_service.get_price(symbol).await)
    }

    /// P/E ratio, earnings and market cap for one symbol.
    pub async fn get_quote_metrics(&self, symbol: &str) -> Result<QuoteMetrics, CoreError> {
        let symbol = validate_symbol(symbol)?;
        Ok(self.quote_service.get_quote_metrics(symbol).await)
    }

    /// Resolve quotes for a list of symbols, sequentially and paced.
    pub async fn resolve_all(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Quote>, CoreError> {
        self.batch_service.resolve_all(symbols).await
    }

    // ── Portfolio ───────────────────────────────────────────────────

    /// The holdings as loaded, with sectors assigned and no live data.
    #[must_use]
    pub fn static_portfolio(&self) -> Vec<Holding> {
        self.portfolio_service.classify_holdings(&self.holdings)
    }

    /// Fetch quotes for every holding and build the live snapshot.
    pub async fn enrich(&self) -> Result<PortfolioSnapshot, CoreError> {
        let symbols: Vec<String> = self.holdings.iter().map(|h| h.symbol.clone()).collect();
        let quotes = self.batch_service.resolve_all(&symbols).await?;
        self.portfolio_service.enrich(&self.holdings, &quotes)
    }

    #[must_use]
    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    #[must_use]
    pub fn settings(&self) -> &TrackerSettings {
        self.quote_service.settings()
    }

    // ── Cache Management ────────────────────────────────────────────

    /// Drop every cached quote, including stale fallbacks.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drop expired cache entries. Returns the number removed.
    pub fn prune_cache(&self) -> usize {
        self.cache.prune_expired()
    }
}

/// Step-by-step construction of a [`PortfolioTracker`].
///
/// Everything except the holdings has a default: system clock, tokio pacer,
/// keyword sector classifier, default settings, and no provider.
pub struct PortfolioTrackerBuilder {
    holdings: Vec<Holding>,
    settings: TrackerSettings,
    provider: Option<Arc<dyn QuoteProvider>>,
    use_yahoo: bool,
    pacer: Arc<dyn Pacer>,
    clock: Arc<dyn Clock>,
    classifier: Arc<dyn SectorClassifier>,
}

impl PortfolioTrackerBuilder {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Self {
            holdings,
            settings: TrackerSettings::default(),
            provider: None,
            use_yahoo: false,
            pacer: Arc::new(TokioPacer),
            clock: Arc::new(SystemClock),
            classifier: Arc::new(KeywordSectorClassifier::default()),
        }
    }

    pub fn with_settings(mut self, settings: TrackerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn QuoteProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use the Yahoo Finance provider configured from the settings.
    pub fn with_yahoo_provider(mut self) -> Self {
        self.use_yahoo = true;
        self
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn SectorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Validate settings and holdings, then wire the services together.
    pub fn build(self) -> Result<PortfolioTracker, CoreError> {
        self.settings.validate()?;
        for holding in &self.holdings {
            holding.validate()?;
        }

        let provider = match self.provider {
            Some(provider) => Some(provider),
            None if self.use_yahoo => Some(Arc::new(
                YahooFinanceProvider::new(
                    self.settings.yahoo_base_url.clone(),
                    self.settings.request_timeout(),
                )?
                .with_session_urls(
                    self.settings.yahoo_session_url.clone(),
                    self.settings.yahoo_crumb_url.clone(),
                ),
            ) as Arc<dyn QuoteProvider>),
            None => None,
        };

        let cache = Arc::new(QuoteCache::with_clock(self.clock));
        let quote_service = Arc::new(match provider {
            Some(provider) => QuoteService::with_provider(cache.clone(), self.settings, provider),
            None => QuoteService::new(cache.clone(), self.settings),
        });
        let batch_service = BatchQuoteService::new(quote_service.clone(), self.pacer);
        let portfolio_service = PortfolioService::new(self.classifier);

        Ok(PortfolioTracker {
            holdings: self.holdings,
            cache,
            quote_service,
            batch_service,
            portfolio_service,
        })
    }
}

fn validate_symbol(symbol: &str) -> Result<&str, CoreError> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput("Symbol must not be blank".into()));
    }
    Ok(trimmed)
}
