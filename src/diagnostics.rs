//! Operational diagnostics shared across the client layers.
//!
//! Price-reading operations absorb upstream faults rather than surfacing
//! them, so the absorbed errors are retained here for the health endpoint:
//! a last-error slot and the map of attempted symbol resolutions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::warn;

/// Inspectable record of absorbed errors and resolution outcomes.
///
/// Thread-safe; shared by the session manager, resolver, and fetcher.
#[derive(Debug, Default)]
pub struct Diagnostics {
    last_error: Mutex<Option<String>>,
    resolved_tokens: Mutex<HashMap<String, Option<String>>>,
}

impl Diagnostics {
    /// Create an empty diagnostics record.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_error(&self) -> MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(|poisoned| {
            warn!("Diagnostics error mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn lock_tokens(&self) -> MutexGuard<'_, HashMap<String, Option<String>>> {
        self.resolved_tokens.lock().unwrap_or_else(|poisoned| {
            warn!("Diagnostics token mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record an absorbed error, replacing any previous one.
    pub fn record_error(&self, message: impl Into<String>) {
        *self.lock_error() = Some(message.into());
    }

    /// Clear the last-error slot after a successful operation.
    pub fn clear_error(&self) {
        *self.lock_error() = None;
    }

    /// The most recent absorbed error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.lock_error().clone()
    }

    /// Record the outcome of a symbol resolution attempt.
    ///
    /// `None` marks a resolution failure; the entry stays visible so
    /// operators can see which symbols never resolved.
    pub fn record_resolution(&self, symbol: &str, token: Option<&str>) {
        self.lock_tokens()
            .insert(symbol.to_string(), token.map(str::to_string));
    }

    /// Snapshot of all recorded resolution outcomes.
    pub fn resolved_tokens(&self) -> HashMap<String, Option<String>> {
        self.lock_tokens().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_error_replace_and_clear() {
        let diag = Diagnostics::new();
        assert_eq!(diag.last_error(), None);

        diag.record_error("ltp_error_attempt_1: timeout");
        diag.record_error("ltp_error_attempt_2: timeout");
        assert_eq!(
            diag.last_error().as_deref(),
            Some("ltp_error_attempt_2: timeout")
        );

        diag.clear_error();
        assert_eq!(diag.last_error(), None);
    }

    #[test]
    fn test_resolution_outcomes_accumulate() {
        let diag = Diagnostics::new();
        diag.record_resolution("RELIANCE", Some("2885"));
        diag.record_resolution("BOGUS", None);

        let tokens = diag.resolved_tokens();
        assert_eq!(tokens.get("RELIANCE"), Some(&Some("2885".to_string())));
        assert_eq!(tokens.get("BOGUS"), Some(&None));
    }
}
