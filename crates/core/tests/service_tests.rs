// ═══════════════════════════════════════════════════════════════════
// Service Tests — BatchQuoteService pacing/caching, PortfolioService
// enrichment and sector rollups
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use portfolio_tracker_core::cache::{CacheNamespace, CachedValue, QuoteCache};
use portfolio_tracker_core::clock::ManualClock;
use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::holding::Holding;
use portfolio_tracker_core::models::quote::{ProviderQuote, Quote, QuoteMetrics};
use portfolio_tracker_core::models::settings::TrackerSettings;
use portfolio_tracker_core::providers::traits::QuoteProvider;
use portfolio_tracker_core::services::batch_service::BatchQuoteService;
use portfolio_tracker_core::services::pacer::Pacer;
use portfolio_tracker_core::services::portfolio_service::{gain_loss_percent, PortfolioService};
use portfolio_tracker_core::services::quote_service::QuoteService;
use portfolio_tracker_core::services::sector_classifier::SectorClassifier;

// ═══════════════════════════════════════════════════════════════════
// Mocks
// ═══════════════════════════════════════════════════════════════════

/// Answers every symbol with a price derived from its length; records calls.
struct CountingProvider {
    failing: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl CountingProvider {
    fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        let provider = Self::new();
        provider.failing.store(true, Ordering::SeqCst);
        provider
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteProvider for CountingProvider {
    fn name(&self) -> &str {
        "Counting"
    }

    async fn fetch_quote(&self, provider_symbol: &str) -> Result<ProviderQuote, CoreError> {
        self.calls.lock().unwrap().push(provider_symbol.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::Network("HTTP 429 Too Many Requests".into()));
        }
        Ok(ProviderQuote {
            regular_market_price: Some(100.0 * provider_symbol.len() as f64),
            forward_pe: Some(15.0),
            eps_current_year: Some(8.0),
            market_cap: Some(50_000.0),
            ..Default::default()
        })
    }
}

/// Records requested pauses instead of sleeping.
#[derive(Default)]
struct RecordingPacer {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, delay: Duration) {
        self.pauses.lock().unwrap().push(delay);
    }
}

/// Everything is "Tech".
struct FixedClassifier;

impl SectorClassifier for FixedClassifier {
    fn classify(&self, _holding_name: &str) -> String {
        "Tech".into()
    }
}

struct Harness {
    batch: BatchQuoteService,
    quotes: Arc<QuoteService>,
    cache: Arc<QuoteCache>,
    provider: Arc<CountingProvider>,
    pacer: Arc<RecordingPacer>,
    clock: Arc<ManualClock>,
}

fn harness(provider: CountingProvider) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
    ));
    let cache = Arc::new(QuoteCache::with_clock(clock.clone()));
    let provider = Arc::new(provider);
    let settings = TrackerSettings {
        mock_seed: Some(99),
        ..TrackerSettings::default()
    };
    let quotes = Arc::new(QuoteService::with_provider(
        cache.clone(),
        settings,
        provider.clone(),
    ));
    let pacer = Arc::new(RecordingPacer::default());
    let batch = BatchQuoteService::new(quotes.clone(), pacer.clone());
    Harness {
        batch,
        quotes,
        cache,
        provider,
        pacer,
        clock,
    }
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn quote(symbol: &str, cmp: f64) -> Quote {
    Quote::from_parts(
        symbol,
        cmp,
        QuoteMetrics {
            pe_ratio: 20.0,
            latest_earnings: 10.0,
            market_cap: 75_000.0,
        },
    )
}

// ═══════════════════════════════════════════════════════════════════
// BatchQuoteService
// ═══════════════════════════════════════════════════════════════════

mod batch {
    use super::*;

    #[tokio::test]
    async fn repeated_batch_within_ttl_calls_upstream_once() {
        let h = harness(CountingProvider::new());

        let first = h.batch.resolve_all(&symbols(&["TCS"])).await.unwrap();
        let second = h.batch.resolve_all(&symbols(&["TCS"])).await.unwrap();

        assert_eq!(h.provider.calls(), vec!["TCS.NS".to_string()]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn one_cached_two_uncached_gives_two_calls_one_pause() {
        let h = harness(CountingProvider::new());
        h.cache.set(
            CacheNamespace::Full.key("INFY"),
            CachedValue::Quote(quote("INFY", 1850.0)),
            Duration::from_secs(120),
        );

        let result = h
            .batch
            .resolve_all(&symbols(&["TCS", "INFY", "WIPRO"]))
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result["INFY"].cmp, 1850.0);
        assert_eq!(
            h.provider.calls(),
            vec!["TCS.NS".to_string(), "WIPRO.NS".to_string()]
        );
        assert_eq!(h.pacer.pauses(), vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn all_cached_means_no_calls_and_no_pauses() {
        let h = harness(CountingProvider::new());
        h.batch.resolve_all(&symbols(&["A", "B"])).await.unwrap();
        let pauses_after_first = h.pacer.pauses().len();

        h.batch.resolve_all(&symbols(&["B", "A"])).await.unwrap();

        assert_eq!(h.provider.calls().len(), 2);
        assert_eq!(h.pacer.pauses().len(), pauses_after_first);
    }

    #[tokio::test]
    async fn duplicates_are_fetched_once() {
        let h = harness(CountingProvider::new());

        let result = h
            .batch
            .resolve_all(&symbols(&["TCS", "TCS", "TCS"]))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(h.provider.calls().len(), 1);
        assert!(h.pacer.pauses().is_empty());
    }

    #[tokio::test]
    async fn padded_symbols_share_cache_with_single_lookups() {
        let h = harness(CountingProvider::new());

        let result = h
            .batch
            .resolve_all(&symbols(&[" TCS", "TCS ", "TCS"]))
            .await
            .unwrap();
        let single = h.quotes.get_quote("TCS").await;

        assert_eq!(result.len(), 1);
        assert!(result.contains_key("TCS"));
        assert_eq!(result["TCS"], single);
        assert_eq!(h.provider.calls(), vec!["TCS.NS".to_string()]);
    }

    #[tokio::test]
    async fn blank_symbol_is_rejected_before_any_call() {
        let h = harness(CountingProvider::new());

        let err = h
            .batch
            .resolve_all(&symbols(&["TCS", "  "]))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(h.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_list_resolves_to_empty_map() {
        let h = harness(CountingProvider::new());
        let result = h.batch.resolve_all(&[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn batch_backfills_price_and_metrics() {
        let h = harness(CountingProvider::new());
        h.batch.resolve_all(&symbols(&["532174"])).await.unwrap();

        let price = h.quotes.get_price("532174").await;
        let metrics = h.quotes.get_quote_metrics("532174").await;

        assert_eq!(h.provider.calls(), vec!["532174.BO".to_string()]);
        assert_eq!(price, 900.0);
        assert_eq!(metrics.pe_ratio, 15.0);
        assert_eq!(metrics.latest_earnings, 8.0);
    }

    #[tokio::test]
    async fn live_results_outlive_single_lookup_ttls() {
        let h = harness(CountingProvider::new());
        h.batch.resolve_all(&symbols(&["TCS"])).await.unwrap();

        h.clock.advance(Duration::from_secs(100));
        h.batch.resolve_all(&symbols(&["TCS"])).await.unwrap();
        assert_eq!(h.provider.calls().len(), 1);

        h.clock.advance(Duration::from_secs(21));
        h.batch.resolve_all(&symbols(&["TCS"])).await.unwrap();
        assert_eq!(h.provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn mock_results_are_cached_briefly_only() {
        let h = harness(CountingProvider::failing());

        let first = h.batch.resolve_all(&symbols(&["TCS"])).await.unwrap();
        assert!(first["TCS"].cmp > 950.0 && first["TCS"].cmp < 1050.0);

        h.clock.advance(Duration::from_secs(10));
        h.batch.resolve_all(&symbols(&["TCS"])).await.unwrap();
        assert_eq!(h.provider.calls().len(), 1);

        h.clock.advance(Duration::from_secs(25));
        h.batch.resolve_all(&symbols(&["TCS"])).await.unwrap();
        assert_eq!(h.provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn failures_still_yield_a_quote_per_symbol() {
        let h = harness(CountingProvider::failing());

        let result = h
            .batch
            .resolve_all(&symbols(&["A", "B", "C"]))
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(h.pacer.pauses().len(), 2);
    }

    #[tokio::test]
    async fn unready_provider_is_not_paced() {
        let cache = Arc::new(QuoteCache::new());
        let quotes = Arc::new(QuoteService::new(cache, TrackerSettings::default()));
        let pacer = Arc::new(RecordingPacer::default());
        let batch = BatchQuoteService::new(quotes, pacer.clone());

        let result = batch.resolve_all(&symbols(&["A", "B", "C"])).await.unwrap();

        assert_eq!(result.len(), 3);
        assert!(pacer.pauses().is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// PortfolioService
// ═══════════════════════════════════════════════════════════════════

mod portfolio {
    use super::*;

    fn holding(id: u32, name: &str, symbol: &str, quantity: f64, investment: f64) -> Holding {
        let mut h = Holding::new(id, name, symbol, 0.0, quantity);
        h.investment = investment;
        h.purchase_price = if quantity > 0.0 { investment / quantity } else { 0.0 };
        h
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn recomputes_value_and_gain() {
        let service = PortfolioService::default();
        let holdings = vec![holding(1, "ABC Ltd", "ABC", 10.0, 1000.0)];
        let quotes = HashMap::from([("ABC".to_string(), quote("ABC", 120.0))]);

        let snapshot = service.enrich(&holdings, &quotes).unwrap();
        let stock = &snapshot.stocks[0];

        assert!(approx(stock.cmp, 120.0));
        assert!(approx(stock.present_value, 1200.0));
        assert!(approx(stock.gain_loss, 200.0));
        assert!(approx(stock.gain_loss_percent, 20.0));
    }

    #[test]
    fn zero_investment_gives_zero_percent() {
        let service = PortfolioService::default();
        let holdings = vec![holding(1, "Gifted Shares", "GIFT", 5.0, 0.0)];
        let quotes = HashMap::from([("GIFT".to_string(), quote("GIFT", 300.0))]);

        let snapshot = service.enrich(&holdings, &quotes).unwrap();

        assert_eq!(snapshot.stocks[0].gain_loss_percent, 0.0);
        assert!(!snapshot.stocks[0].gain_loss_percent.is_nan());
        assert_eq!(snapshot.sector_summaries[0].gain_loss_percent, 0.0);
        assert_eq!(gain_loss_percent(50.0, 0.0), 0.0);
    }

    #[test]
    fn missing_quote_keeps_static_values() {
        let service = PortfolioService::default();
        let mut h = holding(1, "HDFC Bank", "HDFCBANK", 10.0, 15_000.0);
        h.cmp = 1600.0;
        h.pe_ratio = 18.0;
        h.market_cap = 1.2e6;

        let snapshot = service.enrich(&[h], &HashMap::new()).unwrap();
        let stock = &snapshot.stocks[0];

        assert!(approx(stock.cmp, 1600.0));
        assert!(approx(stock.present_value, 16_000.0));
        assert!(approx(stock.gain_loss, 1_000.0));
        assert_eq!(stock.pe_ratio, 18.0);
        assert_eq!(stock.market_cap, 1.2e6);
        assert_eq!(stock.sector, "Financial");
    }

    #[test]
    fn zero_live_fields_fall_back_to_static() {
        let service = PortfolioService::default();
        let mut h = holding(1, "Polycab", "POLYCAB", 2.0, 8_000.0);
        h.cmp = 4_100.0;
        h.latest_earnings = 120.0;
        let live = Quote::from_parts("POLYCAB", 0.0, QuoteMetrics {
            pe_ratio: 45.0,
            latest_earnings: 0.0,
            market_cap: 0.0,
        });
        let quotes = HashMap::from([("POLYCAB".to_string(), live)]);

        let stock = &service.enrich(&[h], &quotes).unwrap().stocks[0];

        assert_eq!(stock.cmp, 4_100.0);
        assert_eq!(stock.pe_ratio, 45.0);
        assert_eq!(stock.latest_earnings, 120.0);
    }

    #[test]
    fn sector_totals_match_member_sums() {
        let service = PortfolioService::default();
        let holdings = vec![
            holding(1, "HDFC Bank", "HDFCBANK", 10.0, 15_000.0),
            holding(2, "Affle India", "AFFLE", 20.0, 22_000.0),
            holding(3, "Bajaj Finance", "BAJFINANCE", 3.0, 20_500.0),
            holding(4, "KPIT Tech", "KPITTECH", 8.0, 11_000.0),
            holding(5, "Clean Science", "CLEAN", 4.0, 6_000.0),
        ];
        let quotes: HashMap<String, Quote> = holdings
            .iter()
            .map(|h| (h.symbol.clone(), quote(&h.symbol, 1_234.56)))
            .collect();

        let snapshot = service.enrich(&holdings, &quotes).unwrap();

        let sectors: Vec<&str> = snapshot
            .sector_summaries
            .iter()
            .map(|s| s.sector.as_str())
            .collect();
        assert_eq!(sectors, vec!["Financial", "Technology", "Others"]);

        for summary in &snapshot.sector_summaries {
            let members: Vec<&Holding> = snapshot
                .stocks
                .iter()
                .filter(|s| s.sector == summary.sector)
                .collect();
            assert_eq!(summary.stock_count, members.len());
            let invested: f64 = members.iter().map(|s| s.investment).sum();
            let present: f64 = members.iter().map(|s| s.present_value).sum();
            assert!(approx(summary.total_investment, invested));
            assert!(approx(summary.total_present_value, present));
            assert!(approx(
                summary.gain_loss_percent,
                (present - invested) / invested * 100.0
            ));
        }
    }

    #[test]
    fn totals_are_order_independent() {
        let service = PortfolioService::default();
        let holdings = vec![
            holding(1, "HDFC Bank", "HDFCBANK", 10.0, 15_000.0),
            holding(2, "Tata Power", "TATAPOWER", 100.0, 22_000.0),
            holding(3, "Astral", "ASTRAL", 7.0, 9_900.0),
        ];
        let quotes = HashMap::from([
            ("HDFCBANK".to_string(), quote("HDFCBANK", 1_650.0)),
            ("TATAPOWER".to_string(), quote("TATAPOWER", 240.0)),
            ("ASTRAL".to_string(), quote("ASTRAL", 1_500.0)),
        ]);

        let forward = service.enrich(&holdings, &quotes).unwrap();
        let mut reversed_holdings = holdings.clone();
        reversed_holdings.reverse();
        let backward = service.enrich(&reversed_holdings, &quotes).unwrap();

        let sum_invest: f64 = forward.stocks.iter().map(|s| s.investment).sum();
        let sum_present: f64 = forward.stocks.iter().map(|s| s.present_value).sum();
        let sum_gain: f64 = forward.stocks.iter().map(|s| s.gain_loss).sum();
        assert!(approx(forward.total_investment, sum_invest));
        assert!(approx(forward.total_present_value, sum_present));
        assert!(approx(forward.total_gain_loss, sum_gain));

        assert!(approx(forward.total_investment, backward.total_investment));
        assert!(approx(forward.total_present_value, backward.total_present_value));
        assert!(approx(forward.total_gain_loss, backward.total_gain_loss));
    }

    #[test]
    fn stock_order_is_preserved() {
        let service = PortfolioService::default();
        let holdings = vec![
            holding(3, "Zeta", "ZETA", 1.0, 10.0),
            holding(1, "Alpha", "ALPHA", 1.0, 10.0),
        ];

        let snapshot = service.enrich(&holdings, &HashMap::new()).unwrap();
        let ids: Vec<u32> = snapshot.stocks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn invalid_holding_fails_fast() {
        let service = PortfolioService::default();
        let holdings = vec![holding(1, "", "ABC", 1.0, 10.0)];

        let err = service.enrich(&holdings, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn custom_classifier_is_used() {
        let service = PortfolioService::new(Arc::new(FixedClassifier));
        let holdings = vec![
            holding(1, "HDFC Bank", "HDFCBANK", 1.0, 10.0),
            holding(2, "Astral", "ASTRAL", 1.0, 10.0),
        ];

        let snapshot = service.enrich(&holdings, &HashMap::new()).unwrap();
        assert_eq!(snapshot.sector_summaries.len(), 1);
        assert_eq!(snapshot.sector_summaries[0].sector, "Tech");
        assert_eq!(snapshot.sector_summaries[0].stock_count, 2);
    }

    #[test]
    fn classify_holdings_leaves_market_fields_alone() {
        let service = PortfolioService::default();
        let mut h = holding(1, "Tata Power", "TATAPOWER", 100.0, 22_000.0);
        h.cmp = 235.0;
        h.present_value = 23_500.0;

        let classified = service.classify_holdings(&[h.clone()]);
        assert_eq!(classified[0].sector, "Power");
        assert_eq!(classified[0].cmp, h.cmp);
        assert_eq!(classified[0].present_value, h.present_value);
    }
}
