//! Session establishment with credential strategy fallback.
//!
//! The upstream provider accepts several login mechanisms, and which of
//! them works depends on the account configuration. The manager keeps an
//! explicit ordered list of strategies, attempts each one whose
//! credentials are configured, and short-circuits on the first success —
//! a strategy failure is data, not an exception.

pub(crate) mod totp;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::config::Credentials;
use crate::diagnostics::Diagnostics;
use crate::errors::MarketDataError;
use crate::provider::{ProviderConnection, RefreshFlow};

/// How long an established session is reused before re-authenticating.
pub const SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// A login strategy, in the order strategies are attempted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthStrategy {
    /// Non-interactive re-authentication via a refresh flow.
    Refresh(RefreshFlow),
    /// Password + TOTP login.
    PasswordTotp,
    /// PIN + TOTP login, for accounts where password login is disallowed.
    PinTotp,
}

impl std::fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Refresh(flow) => write!(f, "{flow}"),
            Self::PasswordTotp => write!(f, "password_totp"),
            Self::PinTotp => write!(f, "pin_totp"),
        }
    }
}

/// An established session: which strategy produced it and when.
#[derive(Clone, Copy, Debug)]
pub struct Session {
    /// The strategy that succeeded, kept for diagnostics.
    pub strategy: AuthStrategy,
    /// When the session was established.
    pub established_at: Instant,
}

impl Session {
    fn is_live(&self) -> bool {
        self.established_at.elapsed() < SESSION_TTL
    }
}

/// Manages the single live session against the provider.
pub struct SessionManager {
    conn: Arc<dyn ProviderConnection>,
    credentials: Credentials,
    diagnostics: Arc<Diagnostics>,
    session: Mutex<Option<Session>>,
}

impl SessionManager {
    /// Create a manager over a connection and the configured credentials.
    pub fn new(
        conn: Arc<dyn ProviderConnection>,
        credentials: Credentials,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            conn,
            credentials,
            diagnostics,
            session: Mutex::new(None),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(|poisoned| {
            log::warn!("Session mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Ensure a live session exists, logging in if necessary.
    ///
    /// Reuses the current session while it is younger than [`SESSION_TTL`].
    /// Otherwise attempts each configured strategy in order and returns
    /// the strategy that succeeded. Individual strategy failures are
    /// retained only as the eventual [`MarketDataError::AuthFailed`]
    /// reason; they never propagate on their own.
    pub async fn ensure_session(&self) -> Result<AuthStrategy, MarketDataError> {
        if let Some(session) = *self.lock_session() {
            if session.is_live() {
                return Ok(session.strategy);
            }
        }

        match self.establish().await {
            Ok(strategy) => {
                *self.lock_session() = Some(Session {
                    strategy,
                    established_at: Instant::now(),
                });
                self.diagnostics.clear_error();
                info!("session established via strategy '{strategy}'");
                Ok(strategy)
            }
            Err(e) => {
                self.diagnostics.record_error(format!("session_error: {e}"));
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<AuthStrategy, MarketDataError> {
        if self.credentials.api_key.is_none() {
            return Err(MarketDataError::MissingApiKey);
        }

        let mut last_failure: Option<String> = None;
        for strategy in self.candidate_strategies() {
            match self.attempt(strategy).await {
                Ok(()) => return Ok(strategy),
                Err(e) => {
                    debug!("login strategy '{strategy}' failed: {e}");
                    last_failure = Some(e.to_string());
                }
            }
        }

        Err(MarketDataError::AuthFailed {
            reason: last_failure.unwrap_or_else(|| {
                "no credentials configured for any login strategy".to_string()
            }),
        })
    }

    /// Strategies worth attempting, given the configured credentials.
    ///
    /// Refresh flows come from the connection's capability descriptor and
    /// are only included when a refresh token is configured; TOTP logins
    /// require their full credential sets.
    fn candidate_strategies(&self) -> Vec<AuthStrategy> {
        let mut strategies = Vec::new();

        if self.credentials.can_refresh() {
            for flow in self.conn.capabilities().refresh_flows {
                strategies.push(AuthStrategy::Refresh(*flow));
            }
        }
        if self.credentials.can_password_totp() {
            strategies.push(AuthStrategy::PasswordTotp);
        }
        if self.credentials.can_pin_totp() {
            strategies.push(AuthStrategy::PinTotp);
        }

        strategies
    }

    async fn attempt(&self, strategy: AuthStrategy) -> Result<(), MarketDataError> {
        match strategy {
            AuthStrategy::Refresh(flow) => {
                // Guarded by candidate_strategies
                let token = self.credentials.refresh_token.as_deref().unwrap_or("");
                self.conn.refresh_session(flow, token).await
            }
            AuthStrategy::PasswordTotp => {
                let code = totp::generate(self.credentials.totp_secret.as_deref().unwrap_or(""))?;
                self.conn
                    .login(
                        self.credentials.client_id.as_deref().unwrap_or(""),
                        self.credentials.password.as_deref().unwrap_or(""),
                        &code,
                    )
                    .await
            }
            AuthStrategy::PinTotp => {
                let code = totp::generate(self.credentials.totp_secret.as_deref().unwrap_or(""))?;
                self.conn
                    .login(
                        self.credentials.client_id.as_deref().unwrap_or(""),
                        self.credentials.mpin.as_deref().unwrap_or(""),
                        &code,
                    )
                    .await
            }
        }
    }

    /// Drop the cached session so the next call re-authenticates.
    ///
    /// Called by the fetcher when an error suggests session expiry.
    pub fn invalidate(&self) {
        *self.lock_session() = None;
    }

    /// The current session, if one has been established.
    pub fn current(&self) -> Option<Session> {
        *self.lock_session()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;

    fn creds_password_totp() -> Credentials {
        Credentials {
            api_key: Some("key".to_string()),
            client_id: Some("C123".to_string()),
            password: Some("hunter2".to_string()),
            totp_secret: Some("GEZDGNBVGY3TQOJQ".to_string()),
            ..Default::default()
        }
    }

    fn manager(conn: Arc<MockConnection>, credentials: Credentials) -> SessionManager {
        SessionManager::new(conn, credentials, Arc::new(Diagnostics::new()))
    }

    #[tokio::test]
    async fn test_password_totp_login_without_refresh_token() {
        // Refresh flows are advertised by the connection, but no refresh
        // token is configured: the refresh strategy must be skipped
        // entirely, not attempted and failed.
        let conn = Arc::new(MockConnection::new().with_refresh_flows(&[
            RefreshFlow::RefreshToken,
            RefreshFlow::SessionToken,
        ]));
        let mgr = manager(conn.clone(), creds_password_totp());

        let strategy = mgr.ensure_session().await.unwrap();

        assert_eq!(strategy, AuthStrategy::PasswordTotp);
        assert_eq!(conn.refresh_calls(), Vec::<RefreshFlow>::new());
        assert_eq!(conn.login_calls(), 1);
        assert_eq!(mgr.current().unwrap().strategy, AuthStrategy::PasswordTotp);
    }

    #[tokio::test]
    async fn test_refresh_flows_attempted_in_declared_order() {
        let conn = Arc::new(
            MockConnection::new()
                .with_refresh_flows(&[RefreshFlow::RefreshToken, RefreshFlow::SessionToken])
                .failing_refresh_flows(&[RefreshFlow::RefreshToken]),
        );
        let mut credentials = creds_password_totp();
        credentials.refresh_token = Some("rtok".to_string());
        let mgr = manager(conn.clone(), credentials);

        let strategy = mgr.ensure_session().await.unwrap();

        assert_eq!(
            strategy,
            AuthStrategy::Refresh(RefreshFlow::SessionToken)
        );
        assert_eq!(
            conn.refresh_calls(),
            vec![RefreshFlow::RefreshToken, RefreshFlow::SessionToken]
        );
        assert_eq!(conn.login_calls(), 0);
    }

    #[tokio::test]
    async fn test_pin_fallback_when_password_rejected() {
        // e.g. AB7001 LoginbyPassword not allowed
        let conn = Arc::new(MockConnection::new().failing_logins(1));
        let mut credentials = creds_password_totp();
        credentials.mpin = Some("4321".to_string());
        let mgr = manager(conn.clone(), credentials);

        let strategy = mgr.ensure_session().await.unwrap();

        assert_eq!(strategy, AuthStrategy::PinTotp);
        assert_eq!(conn.login_calls(), 2);
    }

    #[tokio::test]
    async fn test_all_strategies_failing_reports_last_reason() {
        let conn = Arc::new(MockConnection::new().failing_logins(usize::MAX));
        let mgr = manager(conn, creds_password_totp());

        let error = mgr.ensure_session().await.unwrap_err();
        match error {
            MarketDataError::AuthFailed { reason } => {
                assert!(reason.contains("login rejected"), "reason: {reason}");
            }
            other => panic!("expected AuthFailed, got {other:?}"),
        }
        assert!(mgr.current().is_none());
    }

    #[tokio::test]
    async fn test_no_configured_strategies() {
        let conn = Arc::new(MockConnection::new());
        let credentials = Credentials {
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        let mgr = manager(conn, credentials);

        let error = mgr.ensure_session().await.unwrap_err();
        assert!(matches!(error, MarketDataError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_any_attempt() {
        let conn = Arc::new(MockConnection::new());
        let mut credentials = creds_password_totp();
        credentials.api_key = None;
        let mgr = manager(conn.clone(), credentials);

        let error = mgr.ensure_session().await.unwrap_err();
        assert!(matches!(error, MarketDataError::MissingApiKey));
        assert_eq!(conn.login_calls(), 0);
    }

    #[tokio::test]
    async fn test_live_session_is_reused() {
        let conn = Arc::new(MockConnection::new());
        let mgr = manager(conn.clone(), creds_password_totp());

        mgr.ensure_session().await.unwrap();
        mgr.ensure_session().await.unwrap();

        assert_eq!(conn.login_calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_session_triggers_relogin() {
        let conn = Arc::new(MockConnection::new());
        let mgr = manager(conn.clone(), creds_password_totp());

        mgr.ensure_session().await.unwrap();

        // Backdate the session past the TTL.
        {
            let mut slot = mgr.lock_session();
            let session = slot.as_mut().unwrap();
            session.established_at = Instant::now()
                .checked_sub(SESSION_TTL + Duration::from_secs(1))
                .expect("clock long past epoch");
        }

        mgr.ensure_session().await.unwrap();
        assert_eq!(conn.login_calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_relogin() {
        let conn = Arc::new(MockConnection::new());
        let mgr = manager(conn.clone(), creds_password_totp());

        mgr.ensure_session().await.unwrap();
        mgr.invalidate();
        assert!(mgr.current().is_none());

        mgr.ensure_session().await.unwrap();
        assert_eq!(conn.login_calls(), 2);
    }
}
