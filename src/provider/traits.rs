//! Provider connection trait definition.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::InstrumentRecord;

use super::capabilities::{ConnectionCapabilities, RefreshFlow};

/// An authenticated-capable connection to the upstream provider.
///
/// Implementations declare what they support via [`capabilities`]
/// (fixed at construction) and provide default `NotSupported` bodies for
/// the optional operations, mirroring how provider SDK builds ship with
/// different subsets of the API.
///
/// [`capabilities`]: ProviderConnection::capabilities
#[async_trait]
pub trait ProviderConnection: Send + Sync {
    /// What this connection supports. Must be constant for its lifetime.
    fn capabilities(&self) -> ConnectionCapabilities;

    /// Interactive login with a client id, a password or PIN, and a TOTP
    /// code. On success the connection holds a live session internally.
    async fn login(
        &self,
        client_id: &str,
        secret: &str,
        totp_code: &str,
    ) -> Result<(), MarketDataError>;

    /// Non-interactive re-authentication via one of the advertised
    /// refresh flows.
    ///
    /// Default implementation reports the operation as unsupported; only
    /// flows listed in the capability descriptor should ever be requested.
    async fn refresh_session(
        &self,
        flow: RefreshFlow,
        refresh_token: &str,
    ) -> Result<(), MarketDataError> {
        let _ = (flow, refresh_token);
        Err(MarketDataError::NotSupported {
            operation: "refresh_session",
        })
    }

    /// Bulk instrument master for an exchange.
    ///
    /// Default implementation reports the operation as unsupported.
    async fn instrument_dump(
        &self,
        exchange: &str,
    ) -> Result<Vec<InstrumentRecord>, MarketDataError> {
        let _ = exchange;
        Err(MarketDataError::NotSupported {
            operation: "instrument_dump",
        })
    }

    /// Live fuzzy search for instruments matching a query.
    ///
    /// Default implementation reports the operation as unsupported.
    async fn search_scrip(
        &self,
        exchange: &str,
        query: &str,
    ) -> Result<Vec<InstrumentRecord>, MarketDataError> {
        let _ = (exchange, query);
        Err(MarketDataError::NotSupported {
            operation: "search_scrip",
        })
    }

    /// Last-traded price for a resolved instrument.
    async fn ltp(
        &self,
        exchange: &str,
        trading_symbol: &str,
        token: &str,
    ) -> Result<f64, MarketDataError>;
}
