use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::models::quote::{Quote, QuoteMetrics};

const MOCK_BASE_PRICE: f64 = 1000.0;
/// Total width of the price band: ±2.5% around the base price.
const MOCK_PRICE_SPREAD: f64 = 0.05;

/// Generates placeholder quotes when the provider is down and nothing is cached.
///
/// Ranges:
/// - price: 1000 ± 2.5%
/// - P/E: 10 to 30
/// - earnings: 5 to 55
/// - market cap: 10 000 to 60 000
///
/// All values are rounded to 2 decimal places. With a seed the sequence is
/// reproducible.
pub struct MockQuoteGenerator {
    rng: Mutex<StdRng>,
}

impl MockQuoteGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn price(&self) -> f64 {
        let r: f64 = self.next_unit();
        round2(MOCK_BASE_PRICE * (1.0 + (r - 0.5) * MOCK_PRICE_SPREAD))
    }

    pub fn metrics(&self) -> QuoteMetrics {
        QuoteMetrics {
            pe_ratio: round2(10.0 + self.next_unit() * 20.0),
            latest_earnings: round2(5.0 + self.next_unit() * 50.0),
            market_cap: round2(10_000.0 + self.next_unit() * 50_000.0),
        }
    }

    pub fn quote(&self, symbol: &str) -> Quote {
        Quote::from_parts(symbol, self.price(), self.metrics())
    }

    /// Uniform sample in [0, 1).
    fn next_unit(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .gen::<f64>()
    }
}

impl Default for MockQuoteGenerator {
    fn default() -> Self {
        Self::new(None)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
