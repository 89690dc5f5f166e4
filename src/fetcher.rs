//! Retrying price fetches with a last-known-good fallback.
//!
//! [`PriceFetcher::get_ltp`] never fails outward: after a bounded number
//! of attempts it returns the last price it ever saw for the instrument,
//! or `0.0` when it has never seen one. Callers must treat `0.0` as "no
//! data available", not as a real price.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::debug;

use crate::diagnostics::Diagnostics;
use crate::errors::{is_session_expiry, MarketDataError};
use crate::provider::ProviderConnection;
use crate::resolver::TokenResolver;
use crate::session::SessionManager;

/// Upstream attempts per price request.
const MAX_ATTEMPTS: u32 = 3;

/// Linear backoff step: attempt n sleeps n x this.
const BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Fetches last-traded prices with retries and stale-price fallback.
pub struct PriceFetcher {
    conn: Arc<dyn ProviderConnection>,
    session: Arc<SessionManager>,
    resolver: Arc<TokenResolver>,
    diagnostics: Arc<Diagnostics>,
    last_good: Mutex<HashMap<(String, String), f64>>,
}

impl PriceFetcher {
    /// Create a fetcher over the shared connection, session, and resolver.
    pub fn new(
        conn: Arc<dyn ProviderConnection>,
        session: Arc<SessionManager>,
        resolver: Arc<TokenResolver>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            conn,
            session,
            resolver,
            diagnostics,
            last_good: Mutex::new(HashMap::new()),
        }
    }

    fn lock_last_good(&self) -> MutexGuard<'_, HashMap<(String, String), f64>> {
        self.last_good.lock().unwrap_or_else(|poisoned| {
            log::warn!("Last-known-good mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Last-traded price for a symbol. Possibly stale, `0.0` when no data
    /// has ever been available.
    ///
    /// Makes up to three upstream attempts. Errors whose text indicates
    /// session expiry invalidate the cached session so the next attempt
    /// re-authenticates; every failed attempt sleeps `attempt x 0.5s`
    /// before retrying. Resolution failure aborts immediately with the
    /// last-known-good price - retrying cannot help an unknown symbol.
    pub async fn get_ltp(&self, exchange: &str, symbol: &str) -> f64 {
        let key = (exchange.to_string(), symbol.to_string());
        let last_good = self.lock_last_good().get(&key).copied().unwrap_or(0.0);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_fetch(exchange, symbol).await {
                Ok(Some(price)) => {
                    self.diagnostics.clear_error();
                    if price > 0.0 {
                        self.lock_last_good().insert(key, price);
                        return price;
                    }
                    return last_good;
                }
                Ok(None) => return last_good,
                Err(e) => {
                    debug!("ltp attempt {} for {}:{} failed: {}", attempt, exchange, symbol, e);
                    self.diagnostics
                        .record_error(format!("ltp_error_attempt_{attempt}: {e}"));
                    if is_session_expiry(&e.to_string()) {
                        self.session.invalidate();
                    }
                    tokio::time::sleep(BACKOFF_STEP * attempt).await;
                }
            }
        }

        last_good
    }

    /// One upstream attempt. `Ok(None)` means the symbol did not resolve.
    async fn try_fetch(&self, exchange: &str, symbol: &str) -> Result<Option<f64>, MarketDataError> {
        self.session.ensure_session().await?;

        let resolved = match self.resolver.resolve(exchange, symbol).await {
            Some(resolved) => resolved,
            None => return Ok(None),
        };

        let price = self
            .conn
            .ltp(exchange, &resolved.trading_symbol, &resolved.token)
            .await?;
        Ok(Some(price))
    }
}
