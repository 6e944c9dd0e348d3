use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::portfolio::{PortfolioSnapshot, SectorSummary};
use crate::models::quote::Quote;
use super::sector_classifier::{KeywordSectorClassifier, SectorClassifier};

/// Merges holdings with quotes and rolls the result up by sector.
///
/// Does no I/O: quotes are resolved upstream and passed in.
pub struct PortfolioService {
    classifier: Arc<dyn SectorClassifier>,
}

impl PortfolioService {
    pub fn new(classifier: Arc<dyn SectorClassifier>) -> Self {
        Self { classifier }
    }

    /// Holdings with sectors assigned and the static market fields untouched.
    pub fn classify_holdings(&self, holdings: &[Holding]) -> Vec<Holding> {
        holdings
            .iter()
            .map(|h| Holding {
                sector: self.classifier.classify(&h.name),
                ..h.clone()
            })
            .collect()
    }

    /// Build the live snapshot.
    ///
    /// A holding whose symbol has no quote keeps its static market values.
    /// Fails only when a holding itself is invalid.
    pub fn enrich(
        &self,
        holdings: &[Holding],
        quotes: &HashMap<String, Quote>,
    ) -> Result<PortfolioSnapshot, CoreError> {
        let mut stocks = Vec::with_capacity(holdings.len());
        for holding in holdings {
            holding.validate()?;
            stocks.push(self.enrich_holding(holding, quotes.get(&holding.symbol)));
        }

        let sector_summaries = Self::sector_summaries(&stocks);
        let total_investment = stocks.iter().map(|s| s.investment).sum();
        let total_present_value = stocks.iter().map(|s| s.present_value).sum();
        let total_gain_loss = stocks.iter().map(|s| s.gain_loss).sum();

        Ok(PortfolioSnapshot {
            stocks,
            sector_summaries,
            total_investment,
            total_present_value,
            total_gain_loss,
        })
    }

    /// Recompute one holding's market fields from its quote.
    ///
    /// Each live field is used only when non-zero; otherwise the holding's
    /// static value stays.
    pub fn enrich_holding(&self, holding: &Holding, quote: Option<&Quote>) -> Holding {
        let cmp = quote.map_or(holding.cmp, |q| prefer_live(q.cmp, holding.cmp));
        let present_value = cmp * holding.quantity;
        let gain_loss = present_value - holding.investment;

        Holding {
            sector: self.classifier.classify(&holding.name),
            cmp,
            present_value,
            gain_loss,
            gain_loss_percent: gain_loss_percent(gain_loss, holding.investment),
            pe_ratio: quote.map_or(holding.pe_ratio, |q| prefer_live(q.pe_ratio, holding.pe_ratio)),
            latest_earnings: quote.map_or(holding.latest_earnings, |q| {
                prefer_live(q.latest_earnings, holding.latest_earnings)
            }),
            market_cap: quote.map_or(holding.market_cap, |q| {
                prefer_live(q.market_cap, holding.market_cap)
            }),
            ..holding.clone()
        }
    }

    /// Group enriched holdings by sector, in order of first appearance.
    pub fn sector_summaries(stocks: &[Holding]) -> Vec<SectorSummary> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut summaries: Vec<SectorSummary> = Vec::new();

        for stock in stocks {
            let idx = *index.entry(stock.sector.as_str()).or_insert_with(|| {
                summaries.push(SectorSummary {
                    sector: stock.sector.clone(),
                    stock_count: 0,
                    total_investment: 0.0,
                    total_present_value: 0.0,
                    total_gain_loss: 0.0,
                    gain_loss_percent: 0.0,
                });
                summaries.len() - 1
            });

            let summary = &mut summaries[idx];
            summary.stock_count += 1;
            summary.total_investment += stock.investment;
            summary.total_present_value += stock.present_value;
            summary.total_gain_loss += stock.gain_loss;
        }

        for summary in &mut summaries {
            summary.gain_loss_percent =
                gain_loss_percent(summary.total_gain_loss, summary.total_investment);
        }
        summaries
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new(Arc::new(KeywordSectorClassifier::default()))
    }
}

/// Percentage gain over the invested amount; 0 when nothing was invested.
pub fn gain_loss_percent(gain_loss: f64, investment: f64) -> f64 {
    if investment > 0.0 {
        gain_loss / investment * 100.0
    } else {
        0.0
    }
}

fn prefer_live(live: f64, fallback: f64) -> f64 {
    if live != 0.0 && live.is_finite() {
        live
    } else {
        fallback
    }
}
