use log::info;

use crate::errors::CoreError;
use crate::models::holding::Holding;

/// Loads the static holdings list.
///
/// The source is a JSON array of holding records in camelCase
/// (see [`Holding`]). Order is preserved; it is the display order of the
/// enriched snapshot.
pub struct HoldingsLoader;

impl HoldingsLoader {
    /// Parse and validate holdings from raw JSON bytes.
    ///
    /// Flow: bytes → serde_json → `Vec<Holding>` → per-record validation
    pub fn load_from_bytes(data: &[u8]) -> Result<Vec<Holding>, CoreError> {
        let holdings: Vec<Holding> = serde_json::from_slice(data)
            .map_err(|e| CoreError::Deserialization(format!("Failed to parse holdings: {e}")))?;

        for holding in &holdings {
            holding.validate()?;
        }
        Ok(holdings)
    }

    /// Read holdings from a JSON file on disk.
    pub fn load_from_file(path: &str) -> Result<Vec<Holding>, CoreError> {
        let bytes = std::fs::read(path)?;
        let holdings = Self::load_from_bytes(&bytes)?;
        info!("Loaded {} holdings from {path}", holdings.len());
        Ok(holdings)
    }
}
