use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::CoreError;

/// A static position in the portfolio, loaded once at startup.
///
/// The market fields (`cmp`, `present_value`, `gain_loss`, ...) hold the
/// last-known values from the source sheet. Enrichment overwrites them with
/// live data on a copy; the loaded holdings are never mutated.
///
/// `investment` is taken as-is from the source data. It is expected to equal
/// `purchase_price * quantity` but is never re-derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    /// Row number in the source sheet
    pub id: u32,

    /// Display name (e.g., "HDFC Bank"), also the input to sector classification
    pub name: String,

    #[serde(default)]
    pub purchase_price: f64,

    #[serde(default)]
    pub quantity: f64,

    /// Cost basis of the position
    #[serde(default)]
    pub investment: f64,

    /// Share of the total portfolio, in percent
    #[serde(default)]
    pub portfolio_percent: f64,

    /// Exchange ticker ("HDFCBANK") or numeric BSE code ("532174").
    /// Numeric codes in JSON sources are accepted and stored as strings.
    #[serde(deserialize_with = "symbol_from_string_or_number")]
    pub symbol: String,

    /// Assigned by the sector classifier; empty until classified.
    #[serde(default)]
    pub sector: String,

    // ── Market fields (last-known or live) ──────────────────────────
    /// Current market price
    #[serde(default)]
    pub cmp: f64,

    #[serde(default)]
    pub present_value: f64,

    #[serde(default)]
    pub gain_loss: f64,

    #[serde(default)]
    pub gain_loss_percent: f64,

    #[serde(default)]
    pub market_cap: f64,

    #[serde(default)]
    pub pe_ratio: f64,

    #[serde(default)]
    pub latest_earnings: f64,
}

impl Holding {
    /// Create a holding with `investment = purchase_price * quantity` and
    /// empty market fields.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        symbol: impl Into<String>,
        purchase_price: f64,
        quantity: f64,
    ) -> Self {
        let symbol: String = symbol.into();
        Self {
            id,
            name: name.into(),
            purchase_price,
            quantity,
            investment: purchase_price * quantity,
            portfolio_percent: 0.0,
            symbol: symbol.trim().to_string(),
            sector: String::new(),
            cmp: 0.0,
            present_value: 0.0,
            gain_loss: 0.0,
            gain_loss_percent: 0.0,
            market_cap: 0.0,
            pe_ratio: 0.0,
            latest_earnings: 0.0,
        }
    }

    /// Reject holdings that enrichment cannot work with.
    ///
    /// Rules:
    /// - Name and symbol must be non-blank
    /// - Every numeric field must be finite
    /// - Quantity and investment must not be negative
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "Holding {} has an empty name",
                self.id
            )));
        }
        if self.symbol.trim().is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "Holding {} ({}) has an empty symbol",
                self.id, self.name
            )));
        }

        let numbers = [
            ("purchasePrice", self.purchase_price),
            ("quantity", self.quantity),
            ("investment", self.investment),
            ("portfolioPercent", self.portfolio_percent),
            ("cmp", self.cmp),
            ("presentValue", self.present_value),
            ("gainLoss", self.gain_loss),
            ("gainLossPercent", self.gain_loss_percent),
            ("marketCap", self.market_cap),
            ("peRatio", self.pe_ratio),
            ("latestEarnings", self.latest_earnings),
        ];
        if let Some((field, value)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CoreError::InvalidInput(format!(
                "Holding {} ({}) has a non-finite {field}: {value}",
                self.id, self.name
            )));
        }

        if self.quantity < 0.0 || self.investment < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "Holding {} ({}) has a negative quantity or investment",
                self.id, self.name
            )));
        }

        Ok(())
    }
}

fn symbol_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSymbol {
        Text(String),
        Code(u64),
    }

    Ok(match RawSymbol::deserialize(deserializer)? {
        RawSymbol::Text(s) => s.trim().to_string(),
        RawSymbol::Code(n) => n.to_string(),
    })
}
