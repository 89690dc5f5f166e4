//! Wire types for the SmartAPI HTTP endpoints.

use serde::Deserialize;

/// Every SmartAPI response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    /// True on success.
    #[serde(default)]
    pub status: bool,
    /// Human-readable outcome, e.g. "SUCCESS" or the failure text.
    #[serde(default)]
    pub message: String,
    /// Provider error code, e.g. "AB1004". Empty on success.
    #[serde(default)]
    pub errorcode: String,
    /// Payload; absent on failures.
    pub data: Option<T>,
}

/// Payload of a successful login or token refresh.
#[derive(Debug, Deserialize)]
pub(super) struct SessionData {
    #[serde(rename = "jwtToken", default)]
    pub jwt_token: String,
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: String,
}

/// Payload of the LTP endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct LtpData {
    #[serde(default)]
    pub ltp: f64,
}
