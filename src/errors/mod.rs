//! Error types for the market data crate.
//!
//! The error surface here is deliberately small: price-reading operations
//! absorb provider faults into cached or synthetic fallbacks, so most of
//! these variants only travel between internal layers. Only session
//! establishment (used by the health endpoint) surfaces errors to callers.

use thiserror::Error;

/// Errors that can occur during market data operations.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// No API key is configured, so no session can ever be established.
    #[error("API key not configured")]
    MissingApiKey,

    /// Every configured login strategy failed (or none were configured).
    /// The session manager remains retryable on the next call.
    #[error("No supported login method succeeded: {reason}")]
    AuthFailed {
        /// The last strategy's failure reason, kept for diagnostics.
        reason: String,
    },

    /// The connection does not implement this operation.
    /// An internal fallthrough signal, never user-visible.
    #[error("Operation not supported by connection: {operation}")]
    NotSupported {
        /// The operation that was requested.
        operation: &'static str,
    },

    /// The provider rejected or failed the request.
    #[error("Provider error during {operation}: {message}")]
    ProviderError {
        /// The operation being performed.
        operation: &'static str,
        /// The provider's error message.
        message: String,
    },

    /// The configured TOTP secret could not be used to derive a code.
    #[error("Invalid TOTP secret: {0}")]
    InvalidTotpSecret(String),

    /// A network error occurred while talking to the provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Returns true when an error message indicates the provider session has
/// expired and a fresh login is needed.
///
/// The provider does not use structured error codes consistently, so this
/// matches the two spellings observed in practice: a literal `TokenExpired`
/// marker and any mention of "session".
pub fn is_session_expiry(message: &str) -> bool {
    message.contains("TokenExpired") || message.to_lowercase().contains("session")
}
