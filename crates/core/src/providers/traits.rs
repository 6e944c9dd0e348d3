use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::quote::ProviderQuote;

/// Trait abstraction over the upstream market-data source.
///
/// An implementation only fetches and decodes. Symbol normalization, field
/// fallback chains, caching and failure recovery all live in `QuoteService`,
/// so a provider is free to return any error.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Fetch the raw quote for an exchange-qualified symbol (e.g. "TCS.NS").
    async fn fetch_quote(&self, provider_symbol: &str) -> Result<ProviderQuote, CoreError>;
}
