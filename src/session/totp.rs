//! RFC 6238 time-based one-time codes for the second login factor.

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::MarketDataError;

const STEP_SECONDS: u64 = 30;
const DIGITS: u32 = 6;

/// Generate the current 6-digit TOTP code for a base32-encoded secret.
pub fn generate(secret: &str) -> Result<String, MarketDataError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    generate_at(secret, now)
}

/// Generate the code for a specific unix time. Split out for testing
/// against the RFC 6238 vectors.
pub(crate) fn generate_at(secret: &str, unix_time: u64) -> Result<String, MarketDataError> {
    // Provider portals hand secrets out in mixed case and with padding.
    let normalized = secret
        .trim()
        .trim_end_matches('=')
        .to_ascii_uppercase()
        .replace(' ', "");

    let key = BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| MarketDataError::InvalidTotpSecret(e.to_string()))?;

    let counter = unix_time / STEP_SECONDS;

    let mut mac = Hmac::<Sha1>::new_from_slice(&key)
        .map_err(|e| MarketDataError::InvalidTotpSecret(e.to_string()))?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    // Dynamic truncation per RFC 4226 section 5.3.
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    let code = binary % 10u32.pow(DIGITS);
    Ok(format!("{code:0width$}", width = DIGITS as usize))
}
