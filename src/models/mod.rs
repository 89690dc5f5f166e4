//! Data model for the market data crate.

mod instrument;
mod quote;
mod types;

pub use instrument::{InstrumentRecord, ResolvedToken};
pub use quote::{PriceQuote, QuoteRequest, QuotesPage};
pub use types::Exchange;
