//! Layered symbol-to-token resolution.
//!
//! The provider's bulk instrument dump is incomplete and inconsistently
//! cased, and its live search endpoint has rate and reliability concerns,
//! so resolution is a chain of fallbacks:
//!
//! 1. Token cache hit for the exact `(exchange, symbol)` pair
//! 2. Bulk instrument list - native dump, or the public scrip master when
//!    the native call is unsupported or fails
//! 3. Exact-candidate scan over the bulk list
//! 4. Live fuzzy search across exchange aliases and spelling variants
//!
//! Matching is always exact-string, never substring: a request for "SBI"
//! must not pick up the unrelated "SBIN-EQ" instrument.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::errors::MarketDataError;
use crate::models::{InstrumentRecord, ResolvedToken};
use crate::provider::scrip_master::ScripMasterSource;
use crate::provider::ProviderConnection;
use crate::session::SessionManager;

/// Exchange aliases accepted by different builds of the search endpoint.
const EXCHANGE_ALIASES: [&str; 3] = ["NSE", "NSE_EQ", "NSECM"];

/// Resolves trading symbols to provider instrument tokens.
///
/// Both caches are service-lifetime: instrument lists are cached per
/// exchange once a non-empty load succeeds, and resolved tokens are never
/// re-validated (instrument tokens rarely change upstream).
pub struct TokenResolver {
    conn: Arc<dyn ProviderConnection>,
    session: Arc<SessionManager>,
    scrip_master: ScripMasterSource,
    diagnostics: Arc<Diagnostics>,
    instruments: Mutex<HashMap<String, Arc<[InstrumentRecord]>>>,
    tokens: Mutex<HashMap<(String, String), ResolvedToken>>,
}

impl TokenResolver {
    /// Create a resolver over a connection and session manager.
    pub fn new(
        conn: Arc<dyn ProviderConnection>,
        session: Arc<SessionManager>,
        scrip_master: ScripMasterSource,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            conn,
            session,
            scrip_master,
            diagnostics,
            instruments: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    fn lock_instruments(&self) -> MutexGuard<'_, HashMap<String, Arc<[InstrumentRecord]>>> {
        self.instruments.lock().unwrap_or_else(|poisoned| {
            log::warn!("Instrument cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_tokens(&self) -> MutexGuard<'_, HashMap<(String, String), ResolvedToken>> {
        self.tokens.lock().unwrap_or_else(|poisoned| {
            log::warn!("Token cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Resolve an `(exchange, symbol)` pair to an instrument token.
    ///
    /// Returns `None` when no tier produced an exact match; the failure is
    /// recorded in diagnostics, never raised. Successful resolutions are
    /// cached for the service lifetime; failures are not, so a later call
    /// retries the whole chain.
    pub async fn resolve(&self, exchange: &str, symbol: &str) -> Option<ResolvedToken> {
        let key = (exchange.to_string(), symbol.to_string());
        if let Some(hit) = self.lock_tokens().get(&key).cloned() {
            return Some(hit);
        }

        let instruments = self.load_instruments(exchange).await;
        let mut resolved = scan_instruments(&instruments, symbol);
        if resolved.is_none() {
            resolved = self.search_token(exchange, symbol).await;
        }

        self.diagnostics
            .record_resolution(symbol, resolved.as_ref().map(|r| r.token.as_str()));

        match &resolved {
            Some(found) => {
                debug!(
                    "resolved {}:{} to token {} ({})",
                    exchange, symbol, found.token, found.trading_symbol
                );
                self.lock_tokens().insert(key, found.clone());
                self.diagnostics.clear_error();
            }
            None => {
                warn!("failed to resolve token for {}:{}", exchange, symbol);
                self.diagnostics
                    .record_error(format!("token_not_found: {exchange}:{symbol}"));
            }
        }

        resolved
    }

    /// Bulk instrument list for an exchange, cached once non-empty.
    ///
    /// Empty results are served but not cached, so the next resolution
    /// retries the load.
    async fn load_instruments(&self, exchange: &str) -> Arc<[InstrumentRecord]> {
        if let Some(cached) = self.lock_instruments().get(exchange).cloned() {
            return cached;
        }

        if self.conn.capabilities().supports_instrument_dump {
            match self.native_dump(exchange).await {
                Ok(rows) => {
                    let rows: Arc<[InstrumentRecord]> = rows.into();
                    if !rows.is_empty() {
                        self.lock_instruments()
                            .insert(exchange.to_string(), rows.clone());
                    }
                    return rows;
                }
                Err(e) => {
                    debug!("native instrument dump failed for {}: {}", exchange, e);
                    self.diagnostics
                        .record_error(format!("instrument_dump_error: {e}"));
                }
            }
        }

        match self.scrip_master.fetch(exchange).await {
            Ok(rows) if !rows.is_empty() => {
                let rows: Arc<[InstrumentRecord]> = rows.into();
                debug!(
                    "loaded {} instruments from scrip master for {}",
                    rows.len(),
                    exchange
                );
                self.lock_instruments()
                    .insert(exchange.to_string(), rows.clone());
                rows
            }
            Ok(_) => Arc::from(Vec::new()),
            Err(e) => {
                debug!("scrip master download failed: {e}");
                Arc::from(Vec::new())
            }
        }
    }

    async fn native_dump(&self, exchange: &str) -> Result<Vec<InstrumentRecord>, MarketDataError> {
        self.session.ensure_session().await?;
        let rows = self.conn.instrument_dump(exchange).await?;
        self.diagnostics.clear_error();
        Ok(rows)
    }

    /// Live search fallback across exchange aliases and spelling variants.
    ///
    /// The first search error aborts the whole fallback: the endpoint is
    /// rate-sensitive and a failing call is unlikely to recover within
    /// this resolution attempt.
    async fn search_token(&self, exchange: &str, symbol: &str) -> Option<ResolvedToken> {
        if !self.conn.capabilities().supports_search {
            return None;
        }
        if let Err(e) = self.session.ensure_session().await {
            debug!("search skipped, no session: {e}");
            return None;
        }

        for alias in exchange_aliases(exchange) {
            for term in spelling_candidates(symbol) {
                match self.conn.search_scrip(&alias, &term).await {
                    Ok(rows) => {
                        if !rows.is_empty() {
                            debug!("search {} '{}' returned {} rows", alias, term, rows.len());
                        }
                        let candidates =
                            vec![symbol.to_string(), format!("{symbol}-EQ"), term.clone()];
                        if let Some(found) = first_exact_match(&rows, &candidates) {
                            return Some(found);
                        }
                    }
                    Err(e) => {
                        self.diagnostics
                            .record_error(format!("search_scrip_error: {e}"));
                        return None;
                    }
                }
            }
        }
        None
    }
}

/// Scan a bulk instrument list for the first exact candidate match.
fn scan_instruments(rows: &[InstrumentRecord], symbol: &str) -> Option<ResolvedToken> {
    first_exact_match(rows, &spelling_candidates(symbol))
}

/// First row whose trading symbol, name, or symbol field exactly equals
/// one of the candidates and that carries a usable (non-zero) token.
fn first_exact_match(rows: &[InstrumentRecord], candidates: &[String]) -> Option<ResolvedToken> {
    for row in rows {
        let matched = [
            row.trading_symbol(),
            row.name.as_deref(),
            row.symbol.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .any(|field| candidates.iter().any(|candidate| candidate == field));

        if !matched {
            continue;
        }
        if let Some(token) = row.instrument_token() {
            if token != "0" {
                return Some(ResolvedToken {
                    token: token.to_string(),
                    trading_symbol: row.trading_symbol().unwrap_or_default().to_string(),
                });
            }
        }
    }
    None
}

/// Spelling variants of a symbol, in the order they should be tried.
fn spelling_candidates(symbol: &str) -> Vec<String> {
    let symbol = symbol.trim();
    let variants = [
        symbol.to_string(),
        format!("{symbol}-EQ"),
        symbol.replace("-EQ", ""),
        symbol.replace('_', ""),
        symbol.to_uppercase(),
        symbol.to_lowercase(),
    ];

    let mut out = Vec::new();
    for variant in variants {
        if !variant.is_empty() && !out.contains(&variant) {
            out.push(variant);
        }
    }
    out
}

/// The requested exchange first, then the known aliases.
fn exchange_aliases(exchange: &str) -> Vec<String> {
    let mut out = vec![exchange.to_string()];
    for alias in EXCHANGE_ALIASES {
        if !out.iter().any(|existing| existing == alias) {
            out.push(alias.to_string());
        }
    }
    out
}
