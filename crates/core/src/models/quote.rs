use serde::{Deserialize, Serialize};

/// Canonical market data for one symbol.
///
/// Always fully populated: fields the upstream provider did not report are 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Symbol as requested by the caller (not the exchange-qualified form)
    pub symbol: String,

    /// Current market price
    pub cmp: f64,

    pub pe_ratio: f64,

    /// Trailing twelve-month (or current-year) earnings per share
    pub latest_earnings: f64,

    pub market_cap: f64,
}

impl Quote {
    pub fn from_parts(symbol: impl Into<String>, cmp: f64, metrics: QuoteMetrics) -> Self {
        Self {
            symbol: symbol.into(),
            cmp,
            pe_ratio: metrics.pe_ratio,
            latest_earnings: metrics.latest_earnings,
            market_cap: metrics.market_cap,
        }
    }

    pub fn metrics(&self) -> QuoteMetrics {
        QuoteMetrics {
            pe_ratio: self.pe_ratio,
            latest_earnings: self.latest_earnings,
            market_cap: self.market_cap,
        }
    }
}

/// The fundamentals part of a quote, cached separately from the price.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteMetrics {
    pub pe_ratio: f64,
    pub latest_earnings: f64,
    pub market_cap: f64,
}

/// Where a resolved quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuoteSource {
    /// Fresh from the upstream provider
    Live,
    /// Upstream failed; last cached value returned regardless of expiry
    Stale,
    /// Upstream failed and nothing was cached; generated data
    Mock,
}

impl std::fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteSource::Live => write!(f, "live"),
            QuoteSource::Stale => write!(f, "stale"),
            QuoteSource::Mock => write!(f, "mock"),
        }
    }
}

/// A quote together with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuote {
    pub quote: Quote,
    pub source: QuoteSource,
}

impl ResolvedQuote {
    pub fn is_live(&self) -> bool {
        self.source == QuoteSource::Live
    }
}

/// Raw quote fields as reported by a provider.
///
/// Providers name the same figure differently across asset classes, so each
/// canonical field has a fallback chain (see [`ProviderQuote::into_quote`]).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQuote {
    pub regular_market_price: Option<f64>,
    pub current_price: Option<f64>,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    #[serde(rename = "forwardPE")]
    pub forward_pe: Option<f64>,
    pub eps_trailing_twelve_months: Option<f64>,
    pub eps_current_year: Option<f64>,
    pub market_cap: Option<f64>,
}

impl ProviderQuote {
    /// Map provider fields to the canonical quote.
    ///
    /// A field counts as absent when missing, zero, or non-finite; the next
    /// field in its chain is tried, and 0 is used when the chain is exhausted.
    pub fn into_quote(self, symbol: impl Into<String>) -> Quote {
        Quote {
            symbol: symbol.into(),
            cmp: first_present(&[self.regular_market_price, self.current_price]),
            pe_ratio: first_present(&[self.trailing_pe, self.forward_pe]),
            latest_earnings: first_present(&[
                self.eps_trailing_twelve_months,
                self.eps_current_year,
            ]),
            market_cap: first_present(&[self.market_cap]),
        }
    }
}

fn first_present(candidates: &[Option<f64>]) -> f64 {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(0.0)
}
