use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::errors::CoreError;
use crate::models::quote::ProviderQuote;
use super::traits::QuoteProvider;

const PROVIDER: &str = "Yahoo Finance";
const DEFAULT_SESSION_URL: &str = "https://fc.yahoo.com";
const DEFAULT_CRUMB_URL: &str = "https://query1.finance.yahoo.com/v1/test/getcrumb";

/// Yahoo Finance quote endpoint provider.
///
/// - **Free**: No API key required.
/// - **Rate limited**: answers 429 under bursts, hence the batch pacing.
/// - **Coverage**: NSE (`.NS`) and BSE (`.BO`) listings among others.
/// - **Data**: price plus P/E, EPS and market cap in one call.
/// - **Auth**: every quote request carries a crumb tied to a session
///   cookie. The handshake runs on first use and again whenever the
///   endpoint answers 401.
pub struct YahooFinanceProvider {
    client: Client,
    base_url: String,
    session_url: String,
    crumb_url: String,
    crumb: Mutex<Option<String>>,
}

impl YahooFinanceProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .user_agent("Mozilla/5.0 (compatible; portfolio-tracker)")
            .build()
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            session_url: DEFAULT_SESSION_URL.to_string(),
            crumb_url: DEFAULT_CRUMB_URL.to_string(),
            crumb: Mutex::new(None),
        })
    }

    /// Override where the session cookie and the crumb are obtained.
    pub fn with_session_urls(
        mut self,
        session_url: impl Into<String>,
        crumb_url: impl Into<String>,
    ) -> Self {
        self.session_url = session_url.into();
        self.crumb_url = crumb_url.into();
        self
    }

    /// Current crumb, running the handshake if there is none yet.
    /// Concurrent callers wait on a single handshake.
    async fn crumb(&self) -> Result<String, CoreError> {
        let mut guard = self.crumb.lock().await;
        if let Some(crumb) = guard.as_ref() {
            return Ok(crumb.clone());
        }
        let crumb = self.handshake().await?;
        *guard = Some(crumb.clone());
        Ok(crumb)
    }

    async fn handshake(&self) -> Result<String, CoreError> {
        // The session page answers 404 but still sets the cookie.
        self.client.get(&self.session_url).send().await?;

        let body = self
            .client
            .get(&self.crumb_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let crumb = body.trim();
        if crumb.is_empty() || crumb.contains('<') || crumb.contains('{') {
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: "Crumb endpoint returned no usable crumb".into(),
            });
        }
        debug!("Obtained {PROVIDER} crumb");
        Ok(crumb.to_string())
    }

    async fn request_quote(&self, provider_symbol: &str, crumb: &str) -> Result<Response, CoreError> {
        Ok(self
            .client
            .get(&self.base_url)
            .query(&[("symbols", provider_symbol), ("crumb", crumb)])
            .send()
            .await?)
    }
}

// ── Yahoo Finance API response types ────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteEnvelope {
    quote_response: QuoteResponse,
}

#[derive(Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<ProviderQuote>,
    error: Option<serde_json::Value>,
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch_quote(&self, provider_symbol: &str) -> Result<ProviderQuote, CoreError> {
        let crumb = self.crumb().await?;
        let mut resp = self.request_quote(provider_symbol, &crumb).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            debug!("{PROVIDER} rejected the crumb, refreshing");
            *self.crumb.lock().await = None;
            let crumb = self.crumb().await?;
            resp = self.request_quote(provider_symbol, &crumb).await?;
        }
        let resp = resp.error_for_status()?;

        let envelope: QuoteEnvelope = resp.json().await.map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quote for {provider_symbol}: {e}"),
        })?;

        if let Some(err) = envelope.quote_response.error.filter(|e| !e.is_null()) {
            return Err(CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Quote request for {provider_symbol} failed: {err}"),
            });
        }

        envelope
            .quote_response
            .result
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("No quote data for {provider_symbol}"),
            })
    }
}
