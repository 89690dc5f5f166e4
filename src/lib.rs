//! MarketPro Market Data Crate
//!
//! This crate is the external market-data client of the MarketPro platform.
//! It authenticates against the upstream brokerage API, resolves
//! human-readable ticker symbols to opaque instrument tokens, and serves
//! last-traded prices with aggressive degradation: cached, stale, or
//! synthetic data is always preferred over a hard failure.
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+
//! |  Indices Facade  | --> |  QuotesPage      |  (consumer-facing pages)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! | MarketDataService|  (batching + 0.5s response cache)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  PriceFetcher    |  (retry/backoff, last-known-good fallback)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  TokenResolver   |  (token cache -> bulk dump -> scrip master -> search)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  SessionManager  |  (credential strategy fallback, 30 min reuse)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |ProviderConnection|  (SmartAPI HTTP implementation)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketDataService`] - the facade HTTP handlers talk to
//! - [`IndicesService`] - fixed market-index set with bounded-time fetching
//! - [`ProviderConnection`] - the upstream provider abstraction
//! - [`Credentials`] - optional API credentials driving strategy selection
//! - [`PriceQuote`] / [`QuotesPage`] - consumer-facing quote shapes

pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod fetcher;
pub mod indices;
pub mod models;
pub mod provider;
pub mod resolver;
pub mod service;
pub mod session;

// Re-export the public surface
pub use config::Credentials;
pub use diagnostics::Diagnostics;
pub use errors::{is_session_expiry, MarketDataError};
pub use fetcher::PriceFetcher;
pub use indices::{IndexSpec, IndicesService, MarketStatus, INDICES_FETCH_TIMEOUT, MARKET_INDICES};
pub use models::{Exchange, InstrumentRecord, PriceQuote, QuoteRequest, QuotesPage, ResolvedToken};
pub use provider::scrip_master::{ScripMasterSource, SCRIP_MASTER_URL};
pub use provider::smart_api::SmartApiConnection;
pub use provider::{ConnectionCapabilities, ProviderConnection, RefreshFlow};
pub use resolver::TokenResolver;
pub use service::{CacheKey, HealthReport, MarketDataService, ResponseCache, NIFTY_50_UNIVERSE};
pub use session::{AuthStrategy, Session, SessionManager, SESSION_TTL};

#[cfg(test)]
pub(crate) mod testing;
