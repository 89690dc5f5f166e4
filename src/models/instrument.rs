//! Instrument rows as returned by the provider.
//!
//! The provider's instrument master and search endpoints do not agree on
//! field names across SDK builds: the token may arrive as `symboltoken`,
//! `symbolToken`, `token`, or `symbol_token`, and the trading symbol under
//! several spellings of its own. [`InstrumentRecord`] deserializes all of
//! them and exposes tolerant accessors that apply the documented
//! precedence order.

use serde::{Deserialize, Serialize};

/// Raw row from the provider's instrument master or search endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct InstrumentRecord {
    /// Provider-assigned instrument token (primary spelling variants).
    #[serde(default, alias = "symbolToken", alias = "symbol_token")]
    pub symboltoken: Option<String>,

    /// Instrument token under its short name (scrip master spelling).
    #[serde(default)]
    pub token: Option<String>,

    /// Trading symbol, e.g. "SBIN-EQ".
    #[serde(default, alias = "tradingSymbol", alias = "tsym")]
    pub tradingsymbol: Option<String>,

    /// Bare symbol, sometimes the only populated identifier.
    #[serde(default)]
    pub symbol: Option<String>,

    /// Display name of the instrument.
    #[serde(default)]
    pub name: Option<String>,

    /// Exchange segment the row belongs to, e.g. "NSE" or "BSE".
    #[serde(default)]
    pub exch_seg: Option<String>,
}

impl InstrumentRecord {
    /// The instrument token, trying each field spelling in turn.
    ///
    /// Returns `None` when no variant holds a non-blank value.
    pub fn instrument_token(&self) -> Option<&str> {
        [&self.symboltoken, &self.token]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// The trading symbol, falling back through symbol and name fields.
    pub fn trading_symbol(&self) -> Option<&str> {
        [&self.tradingsymbol, &self.symbol, &self.name]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    /// The exchange segment, uppercased for prefix matching.
    pub fn exchange_segment(&self) -> String {
        self.exch_seg.as_deref().unwrap_or("").trim().to_uppercase()
    }
}

/// A resolved (token, trading symbol) pair.
///
/// Once cached, a resolution is never re-validated for the lifetime of the
/// service: instrument tokens rarely change upstream, and re-resolution on
/// every request would hammer the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedToken {
    /// Opaque numeric token assigned by the provider.
    pub token: String,
    /// The trading symbol the provider resolved the request to.
    pub trading_symbol: String,
}
