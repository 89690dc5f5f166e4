//! Fixed market-index facade with bounded-time fetching.
//!
//! Serves the four headline Indian indices. Live data is preferred, but
//! the facade never hangs and never fails: a fetch that exceeds its
//! deadline or comes back empty is replaced by the most recent real
//! prices (when fresh enough) or by jittered baseline values.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::Timelike;
use log::warn;
use rand::Rng;
use serde::Serialize;

use crate::models::{PriceQuote, QuoteRequest, QuotesPage};
use crate::service::{CacheKey, MarketDataService};

/// Hard deadline for the asynchronous indices fetch.
pub const INDICES_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// How long remembered real prices stay usable as fallback data.
const REAL_DATA_MAX_AGE: Duration = Duration::from_secs(300);

/// A market index: its provider symbol, exchange, and fallback shape.
#[derive(Clone, Copy, Debug)]
pub struct IndexSpec {
    /// Trading symbol of the index.
    pub symbol: &'static str,
    /// Exchange the index trades on.
    pub exchange: &'static str,
    /// Baseline price used when synthesizing fallback data.
    pub baseline: f64,
    /// Uniform jitter bound applied to the baseline (fraction of 1).
    pub jitter: f64,
}

/// The four headline indices, in display order.
///
/// Volatility moves far more than the price indices, so INDIA VIX gets a
/// wider jitter band.
pub const MARKET_INDICES: [IndexSpec; 4] = [
    IndexSpec { symbol: "NIFTY 50", exchange: "NSE", baseline: 19800.50, jitter: 0.01 },
    IndexSpec { symbol: "NIFTY BANK", exchange: "NSE", baseline: 45200.75, jitter: 0.01 },
    IndexSpec { symbol: "SENSEX", exchange: "BSE", baseline: 66500.25, jitter: 0.01 },
    IndexSpec { symbol: "INDIA VIX", exchange: "NSE", baseline: 13.45, jitter: 0.05 },
];

/// Coarse market-hours indicator for display purposes.
#[derive(Clone, Debug, Serialize)]
pub struct MarketStatus {
    /// "OPEN" or "CLOSED".
    pub status: &'static str,
    /// Human-readable companion text.
    pub message: &'static str,
}

#[derive(Default)]
struct LastReal {
    prices: HashMap<&'static str, f64>,
    updated_at: Option<Instant>,
}

/// Serves the fixed index set on top of [`MarketDataService`].
pub struct IndicesService {
    market_data: Arc<MarketDataService>,
    last_real: Mutex<LastReal>,
}

impl IndicesService {
    /// Create the facade over a shared market data service.
    pub fn new(market_data: Arc<MarketDataService>) -> Arc<Self> {
        Arc::new(Self {
            market_data,
            last_real: Mutex::new(LastReal::default()),
        })
    }

    fn lock_last_real(&self) -> MutexGuard<'_, LastReal> {
        self.last_real.lock().unwrap_or_else(|poisoned| {
            warn!("Index fallback mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Fetch all indices synchronously (with respect to the upstream
    /// retry budget - this can block for several seconds).
    ///
    /// Quotes with a real price refresh the fallback memory. When no
    /// index produced a price at all, the upstream is considered
    /// unavailable and synthetic fallback data is served instead.
    pub async fn indices(&self) -> Vec<PriceQuote> {
        let requests: Vec<QuoteRequest> = MARKET_INDICES
            .iter()
            .map(|spec| QuoteRequest::new(spec.exchange, spec.symbol))
            .collect();

        let fetched = self.market_data.get_many_ltp(&requests).await;
        let live: Vec<PriceQuote> = fetched.into_iter().filter(|q| q.price > 0.0).collect();

        if live.is_empty() {
            warn!("no live index data available, serving fallback");
            return self.fallback_quotes();
        }

        let mut last = self.lock_last_real();
        last.updated_at = Some(Instant::now());
        for quote in &live {
            for spec in &MARKET_INDICES {
                if spec.symbol == quote.symbol {
                    last.prices.insert(spec.symbol, quote.price);
                }
            }
        }

        live
    }

    /// Fetch all indices with a hard deadline.
    ///
    /// The fetch runs on a background task; when it outlives the
    /// deadline it is abandoned (it may still complete and refresh the
    /// last-known-good caches) and fallback data is returned instead.
    pub async fn indices_with_timeout(self: &Arc<Self>) -> Vec<PriceQuote> {
        let this = Arc::clone(self);
        let fetch = tokio::spawn(async move { this.indices().await });

        match tokio::time::timeout(INDICES_FETCH_TIMEOUT, fetch).await {
            Ok(Ok(quotes)) => quotes,
            Ok(Err(join_error)) => {
                warn!("indices fetch task failed: {join_error}");
                self.fallback_quotes()
            }
            Err(_) => {
                warn!(
                    "indices fetch exceeded {:?}, serving fallback",
                    INDICES_FETCH_TIMEOUT
                );
                self.fallback_quotes()
            }
        }
    }

    /// The indices as a consumer page, through the shared response cache.
    pub async fn indices_page(self: &Arc<Self>) -> QuotesPage {
        let key = CacheKey::endpoint("indices");
        if let Some(page) = self.market_data.cache().get(&key) {
            return page;
        }

        let quotes = self.indices_with_timeout().await;
        let total = quotes.len();
        let page = QuotesPage::new(quotes, total);
        self.market_data.cache().put(key, page.clone());
        page
    }

    /// Last remembered real prices when fresh, jittered baselines
    /// otherwise.
    pub fn fallback_quotes(&self) -> Vec<PriceQuote> {
        let last = self.lock_last_real();
        let fresh = last
            .updated_at
            .map(|at| at.elapsed() < REAL_DATA_MAX_AGE)
            .unwrap_or(false);

        MARKET_INDICES
            .iter()
            .map(|spec| {
                let remembered = if fresh {
                    last.prices.get(spec.symbol).copied()
                } else {
                    None
                };
                let price = remembered.unwrap_or_else(|| synthesize(spec));
                PriceQuote::new(spec.symbol, round2(price))
            })
            .collect()
    }

    /// Coarse trading-hours indicator.
    pub fn market_status(&self) -> MarketStatus {
        let hour = chrono::Local::now().hour();
        if (9..=15).contains(&hour) {
            MarketStatus {
                status: "OPEN",
                message: "Market is open",
            }
        } else {
            MarketStatus {
                status: "CLOSED",
                message: "Market is closed",
            }
        }
    }
}

/// Baseline price with uniform jitter inside the index's band.
fn synthesize(spec: &IndexSpec) -> f64 {
    let jitter = rand::thread_rng().gen_range(-spec.jitter..=spec.jitter);
    spec.baseline * (1.0 + jitter)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
