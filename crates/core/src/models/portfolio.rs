use serde::{Deserialize, Serialize};

use super::holding::Holding;

/// Roll-up of all holdings that share a sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorSummary {
    pub sector: String,
    pub stock_count: usize,
    pub total_investment: f64,
    pub total_present_value: f64,
    pub total_gain_loss: f64,
    /// (total_gain_loss / total_investment) * 100, or 0 when nothing is invested
    pub gain_loss_percent: f64,
}

/// The full live view of the portfolio, built fresh for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    /// Enriched holdings, in source order
    pub stocks: Vec<Holding>,

    /// One entry per sector, in order of first appearance
    pub sector_summaries: Vec<SectorSummary>,

    pub total_investment: f64,
    pub total_present_value: f64,
    pub total_gain_loss: f64,
}
