//! The market data service facade.
//!
//! One [`MarketDataService`] instance owns all shared client state - the
//! session slot, the instrument and token caches, the last-known-good
//! prices, and the response cache - and is shared by reference with every
//! consumer. This is the explicit-service rendering of what would
//! otherwise be process-wide globals.

mod cache;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Credentials;
use crate::diagnostics::Diagnostics;
use crate::fetcher::PriceFetcher;
use crate::models::{PriceQuote, QuoteRequest, QuotesPage};
use crate::provider::scrip_master::ScripMasterSource;
use crate::provider::smart_api::SmartApiConnection;
use crate::provider::ProviderConnection;
use crate::resolver::TokenResolver;
use crate::session::SessionManager;

pub use cache::{CacheKey, ResponseCache, RESPONSE_CACHE_TTL};

/// The NIFTY 50 constituents served by the live-quotes endpoint.
pub const NIFTY_50_UNIVERSE: [&str; 50] = [
    "RELIANCE-EQ", "TCS-EQ", "HDFCBANK-EQ", "ICICIBANK-EQ", "INFY-EQ",
    "ITC-EQ", "LT-EQ", "SBIN-EQ", "HINDUNILVR-EQ", "BHARTIARTL-EQ",
    "KOTAKBANK-EQ", "AXISBANK-EQ", "BAJFINANCE-EQ", "ADANIENT-EQ", "ADANIPORTS-EQ",
    "ASIANPAINT-EQ", "TITAN-EQ", "ULTRACEMCO-EQ", "MARUTI-EQ", "M&M-EQ",
    "NTPC-EQ", "POWERGRID-EQ", "TATAMOTORS-EQ", "TATASTEEL-EQ", "SUNPHARMA-EQ",
    "WIPRO-EQ", "TECHM-EQ", "HCLTECH-EQ", "NESTLEIND-EQ", "JSWSTEEL-EQ",
    "GRASIM-EQ", "CIPLA-EQ", "DRREDDY-EQ", "BRITANNIA-EQ", "ONGC-EQ",
    "COALINDIA-EQ", "HEROMOTOCO-EQ", "EICHERMOT-EQ", "BAJAJFINSV-EQ", "HDFCLIFE-EQ",
    "SBILIFE-EQ", "DIVISLAB-EQ", "APOLLOHOSP-EQ", "BPCL-EQ", "BAJAJ-AUTO-EQ",
    "TATACONSUM-EQ", "HINDALCO-EQ", "INDUSINDBK-EQ", "TATAPOWER-EQ", "UPL-EQ",
];

/// Diagnostic snapshot served by the health endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    /// Whether a session could be established.
    pub session_ok: bool,
    /// The login strategy of the current session, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_strategy: Option<String>,
    /// The most recent absorbed error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Every attempted symbol resolution and its outcome.
    pub resolved_tokens: HashMap<String, Option<String>>,
    /// The session-establishment error, when establishment failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Facade over the session, resolution, and fetching layers.
pub struct MarketDataService {
    session: Arc<SessionManager>,
    resolver: Arc<TokenResolver>,
    fetcher: PriceFetcher,
    cache: ResponseCache,
    diagnostics: Arc<Diagnostics>,
}

impl MarketDataService {
    /// Build the full service stack from the environment: credentials
    /// from env vars, the SmartAPI connection, and the hosted scrip
    /// master as resolution fallback.
    pub fn from_env() -> Arc<Self> {
        let credentials = Credentials::from_env();
        let api_key = credentials.api_key.clone().unwrap_or_default();
        let conn = Arc::new(SmartApiConnection::new(api_key));
        Self::new(conn, credentials)
    }

    /// Build the service over an existing connection.
    pub fn new(conn: Arc<dyn ProviderConnection>, credentials: Credentials) -> Arc<Self> {
        Self::with_scrip_master(conn, credentials, ScripMasterSource::new())
    }

    /// Build the service with a custom scrip-master source (e.g. a
    /// self-hosted mirror).
    pub fn with_scrip_master(
        conn: Arc<dyn ProviderConnection>,
        credentials: Credentials,
        scrip_master: ScripMasterSource,
    ) -> Arc<Self> {
        let diagnostics = Arc::new(Diagnostics::new());
        let session = Arc::new(SessionManager::new(
            conn.clone(),
            credentials,
            diagnostics.clone(),
        ));
        let resolver = Arc::new(TokenResolver::new(
            conn.clone(),
            session.clone(),
            scrip_master,
            diagnostics.clone(),
        ));
        let fetcher = PriceFetcher::new(conn, session.clone(), resolver.clone(), diagnostics.clone());

        Arc::new(Self {
            session,
            resolver,
            fetcher,
            cache: ResponseCache::new(),
            diagnostics,
        })
    }

    pub(crate) fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Last-traded price for one symbol. Never fails; `0.0` means no
    /// data has ever been available.
    pub async fn get_ltp(&self, exchange: &str, symbol: &str) -> f64 {
        self.fetcher.get_ltp(exchange, symbol).await
    }

    /// Prices for a batch of symbols, fetched sequentially.
    ///
    /// Zero prices pass through uncorrected; interpreting them is the
    /// caller's job.
    pub async fn get_many_ltp(&self, items: &[QuoteRequest]) -> Vec<PriceQuote> {
        let mut quotes = Vec::with_capacity(items.len());
        for item in items {
            let price = self
                .fetcher
                .get_ltp(&item.exchange, &item.trading_symbol)
                .await;
            quotes.push(PriceQuote::new(item.trading_symbol.to_string(), price));
        }
        quotes
    }

    /// A page of the NIFTY 50 universe, served through the response
    /// cache to collapse polling bursts.
    pub async fn live_page(&self, limit: usize, offset: usize) -> QuotesPage {
        let key = CacheKey::new("live", limit, offset);
        if let Some(page) = self.cache.get(&key) {
            return page;
        }

        let start = offset.min(NIFTY_50_UNIVERSE.len());
        let end = offset.saturating_add(limit).min(NIFTY_50_UNIVERSE.len());
        let requests: Vec<QuoteRequest> = NIFTY_50_UNIVERSE[start..end]
            .iter()
            .map(|symbol| QuoteRequest::new("NSE", *symbol))
            .collect();

        let quotes = self.get_many_ltp(&requests).await;
        let page = QuotesPage::new(quotes, NIFTY_50_UNIVERSE.len());
        self.cache.put(key, page.clone());
        page
    }

    /// Health snapshot: tries to establish a session and resolve a
    /// well-known liquid symbol, and reports the diagnostics gathered so
    /// far. This is the one path where a raw session error is surfaced.
    pub async fn health(&self) -> HealthReport {
        let mut report = HealthReport {
            session_ok: false,
            session_strategy: None,
            last_error: self.diagnostics.last_error(),
            resolved_tokens: self.diagnostics.resolved_tokens(),
            error: None,
        };

        match self.session.ensure_session().await {
            Ok(strategy) => {
                report.session_ok = true;
                report.session_strategy = Some(strategy.to_string());
                // Exercise the resolution path end to end.
                let _ = self.resolver.resolve("NSE", "RELIANCE").await;
            }
            Err(e) => {
                report.error = Some(e.to_string());
            }
        }

        report
    }
}
