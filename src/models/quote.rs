//! Consumer-facing quote shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::Exchange;

/// A single (exchange, trading symbol) lookup request.
#[derive(Clone, Debug)]
pub struct QuoteRequest {
    /// Exchange to resolve the symbol on.
    pub exchange: Exchange,
    /// Human-readable trading symbol, e.g. "RELIANCE-EQ".
    pub trading_symbol: std::borrow::Cow<'static, str>,
}

impl QuoteRequest {
    /// Build a request from borrowed or owned parts.
    pub fn new(
        exchange: impl Into<Exchange>,
        trading_symbol: impl Into<std::borrow::Cow<'static, str>>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            trading_symbol: trading_symbol.into(),
        }
    }
}

/// A last-traded-price quote.
///
/// A price of `0.0` means "no data available", never a real price; callers
/// are expected to interpret it, not correct it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceQuote {
    /// The symbol the quote is for.
    pub symbol: String,

    /// Last-traded price. Possibly stale; `0.0` when no data exists.
    pub price: f64,

    /// Percent change, when the provider supplies it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<f64>,

    /// When this quote was produced.
    pub timestamp: DateTime<Utc>,
}

impl PriceQuote {
    /// Create a quote stamped with the current time.
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            percent_change: None,
            timestamp: Utc::now(),
        }
    }
}

/// A page of quotes, as served to polling HTTP clients.
///
/// `total` counts the full universe behind the endpoint, not the page
/// length, so clients can paginate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuotesPage {
    /// Quotes for the requested page.
    pub quotes: Vec<PriceQuote>,
    /// Unix timestamp (seconds) the page was assembled at.
    pub ts: i64,
    /// Size of the full universe behind this endpoint.
    pub total: usize,
}

impl QuotesPage {
    /// Assemble a page stamped with the current time.
    pub fn new(quotes: Vec<PriceQuote>, total: usize) -> Self {
        Self {
            quotes,
            ts: Utc::now().timestamp(),
            total,
        }
    }
}
