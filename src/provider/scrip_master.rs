//! Public scrip-master fallback source.
//!
//! When the connection cannot list instruments natively, the resolver
//! downloads the provider's publicly hosted scrip master: a JSON array of
//! every tradable instrument with its token and exchange segment.

use log::debug;
use reqwest::Client;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::InstrumentRecord;

/// Publicly hosted instrument master, no authentication required.
pub const SCRIP_MASTER_URL: &str =
    "https://margincalculator.angelbroking.com/OpenAPI_File/files/OpenAPIScripMaster.json";

/// The scrip master is large; keep the download bounded.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Downloads and filters the public scrip-master file.
pub struct ScripMasterSource {
    client: Client,
    url: String,
}

impl ScripMasterSource {
    /// Source pointed at the provider's hosted file.
    pub fn new() -> Self {
        Self::with_url(SCRIP_MASTER_URL)
    }

    /// Source pointed at a custom URL (e.g. a self-hosted mirror).
    pub fn with_url(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.into(),
        }
    }

    /// Download the file and keep only rows for the given exchange.
    pub async fn fetch(&self, exchange: &str) -> Result<Vec<InstrumentRecord>, MarketDataError> {
        let rows: Vec<InstrumentRecord> = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let filtered = filter_by_exchange(rows, exchange);
        debug!(
            "scrip master: {} rows after filtering for '{}'",
            filtered.len(),
            exchange
        );
        Ok(filtered)
    }
}

impl Default for ScripMasterSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep rows whose exchange segment matches the requested exchange.
///
/// Segments carry suffixes (`NSE_CM`, `BSE_FO`, ...), so matching is by
/// family prefix: an `NSE*` segment matches an `NSE*` request, likewise
/// for `BSE*`.
fn filter_by_exchange(rows: Vec<InstrumentRecord>, exchange: &str) -> Vec<InstrumentRecord> {
    let wanted = exchange.trim().to_uppercase();
    rows.into_iter()
        .filter(|row| {
            let segment = row.exchange_segment();
            (segment.starts_with("NSE") && wanted.starts_with("NSE"))
                || (segment.starts_with("BSE") && wanted.starts_with("BSE"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(exch_seg: &str, symbol: &str) -> InstrumentRecord {
        InstrumentRecord {
            token: Some("1".to_string()),
            symbol: Some(symbol.to_string()),
            exch_seg: Some(exch_seg.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_filter_matches_by_family_prefix() {
        let rows = vec![
            row("NSE", "SBIN-EQ"),
            row("nse_cm", "INFY-EQ"),
            row("BSE", "SENSEX"),
            row("MCX", "GOLD"),
        ];

        let nse = filter_by_exchange(rows.clone(), "NSE");
        assert_eq!(nse.len(), 2);

        let bse = filter_by_exchange(rows.clone(), "bse");
        assert_eq!(bse.len(), 1);
        assert_eq!(bse[0].symbol.as_deref(), Some("SENSEX"));

        let mcx = filter_by_exchange(rows, "MCX");
        assert!(mcx.is_empty());
    }

    #[test]
    fn test_filter_accepts_exchange_aliases() {
        let rows = vec![row("NSE", "SBIN-EQ")];
        let filtered = filter_by_exchange(rows, "NSE_EQ");
        assert_eq!(filtered.len(), 1);
    }
}
