use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{CacheNamespace, CachedValue};
use crate::errors::CoreError;
use crate::models::quote::Quote;
use super::pacer::Pacer;
use super::quote_service::{LiveTtls, QuoteService};

/// Resolves quotes for many symbols, one at a time.
///
/// Symbols are processed strictly in order with a fixed pause between
/// consecutive upstream calls; the provider rate-limits bursts. Cache hits
/// cost neither a call nor a pause.
///
/// Live results are cached under the full-quote namespace for the batch TTL
/// and backfilled into the price and metrics namespaces so single-symbol
/// lookups benefit too. Fallback results keep whatever short TTL
/// `QuoteService` gave them.
pub struct BatchQuoteService {
    quotes: Arc<QuoteService>,
    pacer: Arc<dyn Pacer>,
}

impl BatchQuoteService {
    pub fn new(quotes: Arc<QuoteService>, pacer: Arc<dyn Pacer>) -> Self {
        Self { quotes, pacer }
    }

    /// Resolve every symbol to a quote.
    ///
    /// Fails only on invalid input (a blank symbol), before any upstream call.
    /// Provider failures are absorbed by `QuoteService`. Symbols are trimmed
    /// before use, and the result map is keyed by the trimmed form, so a
    /// symbol listed twice (with or without padding) is fetched at most once.
    pub async fn resolve_all(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Quote>, CoreError> {
        if let Some(pos) = symbols.iter().position(|s| s.trim().is_empty()) {
            return Err(CoreError::InvalidInput(format!(
                "Symbol at position {pos} is blank"
            )));
        }

        let cache = self.quotes.cache();
        let settings = self.quotes.settings();
        let ttls = LiveTtls::uniform(settings.batch_ttl());
        let delay = settings.pacing_delay();

        let mut results: HashMap<String, Quote> = HashMap::with_capacity(symbols.len());
        let mut fetched = 0usize;

        for symbol in symbols.iter().map(|s| s.trim()) {
            if results.contains_key(symbol) {
                continue;
            }

            let cached = cache
                .get(&CacheNamespace::Full.key(symbol))
                .and_then(CachedValue::into_quote);
            if let Some(quote) = cached {
                debug!("Cache hit for {symbol}");
                results.insert(symbol.to_string(), quote);
                continue;
            }

            // Pause between upstream calls, not after the last one.
            // Without a provider nothing goes upstream, so there is nothing to pace.
            if fetched > 0 && self.quotes.is_ready() {
                self.pacer.pause(delay).await;
            }

            let resolved = self.quotes.resolve(symbol).await;
            fetched += 1;
            if resolved.is_live() {
                self.quotes.store_live(&resolved.quote, ttls);
            }
            results.insert(symbol.to_string(), resolved.quote);
        }

        info!(
            "Resolved {} symbols ({} from cache, {} upstream)",
            results.len(),
            results.len() - fetched,
            fetched
        );
        Ok(results)
    }
}
