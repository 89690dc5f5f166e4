//! SmartAPI provider connection.
//!
//! HTTP implementation of [`ProviderConnection`] against the upstream
//! brokerage REST API.
//!
//! # API Endpoints
//!
//! - Login: `POST /rest/auth/angelbroking/user/v1/loginByPassword`
//! - Token refresh: `POST /rest/auth/angelbroking/jwt/v1/generateTokens`
//! - Scrip search: `POST /rest/secure/angelbroking/order/v1/searchScrip`
//! - Last-traded price: `POST /rest/secure/angelbroking/order/v1/getLtpData`
//!
//! The API exposes no bulk instrument listing over REST, so this
//! connection advertises `supports_instrument_dump: false`; the resolver
//! covers that gap with the public scrip-master file.

mod models;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::InstrumentRecord;
use crate::provider::{ConnectionCapabilities, ProviderConnection, RefreshFlow};

use models::{Envelope, LtpData, SessionData};

const BASE_URL: &str = "https://apiconnect.angelbroking.com";

const LOGIN_PATH: &str = "/rest/auth/angelbroking/user/v1/loginByPassword";
const REFRESH_PATH: &str = "/rest/auth/angelbroking/jwt/v1/generateTokens";
const SEARCH_PATH: &str = "/rest/secure/angelbroking/order/v1/searchScrip";
const LTP_PATH: &str = "/rest/secure/angelbroking/order/v1/getLtpData";

/// Default HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Session tokens held after a successful login or refresh.
#[derive(Clone, Debug)]
struct AuthTokens {
    jwt: String,
    refresh: String,
}

/// Connection to the SmartAPI REST endpoints.
///
/// Holds its session tokens internally; the session manager decides when
/// to (re-)authenticate.
pub struct SmartApiConnection {
    client: Client,
    api_key: String,
    base_url: String,
    tokens: Mutex<Option<AuthTokens>>,
}

impl SmartApiConnection {
    /// Create a connection for the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Create a connection against a non-default API host.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            tokens: Mutex::new(None),
        }
    }

    fn lock_tokens(&self) -> MutexGuard<'_, Option<AuthTokens>> {
        self.tokens.lock().unwrap_or_else(|poisoned| {
            log::warn!("SmartAPI token mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// POST a JSON body and unwrap the SmartAPI envelope.
    ///
    /// A `status: false` envelope is surfaced as a `ProviderError` whose
    /// message keeps the provider's text and error code, so the session
    /// expiry classifier can see markers like `TokenExpired`.
    async fn post<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: Value,
        authorized: bool,
    ) -> Result<Option<T>, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .post(&url)
            .json(&body)
            .header("Accept", "application/json")
            .header("X-UserType", "USER")
            .header("X-SourceID", "WEB")
            .header("X-ClientLocalIP", "127.0.0.1")
            .header("X-ClientPublicIP", "127.0.0.1")
            .header("X-MACAddress", "00:00:00:00:00:00")
            .header("X-PrivateKey", &self.api_key);

        if authorized {
            let jwt = self.lock_tokens().as_ref().map(|t| t.jwt.clone());
            let jwt = jwt.ok_or(MarketDataError::ProviderError {
                operation,
                message: "no active session".to_string(),
            })?;
            request = request.bearer_auth(jwt);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MarketDataError::ProviderError {
                operation,
                message: format!("HTTP error: {status}"),
            });
        }

        let envelope: Envelope<T> =
            response
                .json()
                .await
                .map_err(|e| MarketDataError::ProviderError {
                    operation,
                    message: format!("failed to parse response: {e}"),
                })?;

        if !envelope.status {
            return Err(MarketDataError::ProviderError {
                operation,
                message: format!("{} ({})", envelope.message, envelope.errorcode),
            });
        }

        Ok(envelope.data)
    }

    /// Unwrap a payload that must be present on success.
    fn required<T>(operation: &'static str, data: Option<T>) -> Result<T, MarketDataError> {
        data.ok_or(MarketDataError::ProviderError {
            operation,
            message: "empty response payload".to_string(),
        })
    }

    fn store_session(&self, data: SessionData) {
        *self.lock_tokens() = Some(AuthTokens {
            jwt: data.jwt_token,
            refresh: data.refresh_token,
        });
    }

    /// The refresh token issued with the current session, if any.
    ///
    /// The provider rotates refresh tokens on login; callers persisting
    /// credentials across restarts read the fresh one from here.
    pub fn issued_refresh_token(&self) -> Option<String> {
        self.lock_tokens().as_ref().map(|t| t.refresh.clone())
    }
}

#[async_trait]
impl ProviderConnection for SmartApiConnection {
    fn capabilities(&self) -> ConnectionCapabilities {
        ConnectionCapabilities {
            refresh_flows: &[RefreshFlow::RefreshToken],
            supports_instrument_dump: false,
            supports_search: true,
        }
    }

    async fn login(
        &self,
        client_id: &str,
        secret: &str,
        totp_code: &str,
    ) -> Result<(), MarketDataError> {
        let body = json!({
            "clientcode": client_id,
            "password": secret,
            "totp": totp_code,
        });
        let data = Self::required(
            "login",
            self.post::<SessionData>("login", LOGIN_PATH, body, false).await?,
        )?;
        debug!("SmartAPI login succeeded for client '{client_id}'");
        self.store_session(data);
        Ok(())
    }

    async fn refresh_session(
        &self,
        flow: RefreshFlow,
        refresh_token: &str,
    ) -> Result<(), MarketDataError> {
        match flow {
            RefreshFlow::RefreshToken => {
                let body = json!({ "refreshToken": refresh_token });
                let data = Self::required(
                    "refresh_session",
                    self.post::<SessionData>("refresh_session", REFRESH_PATH, body, false)
                        .await?,
                )?;
                debug!("SmartAPI session refreshed");
                self.store_session(data);
                Ok(())
            }
            _ => Err(MarketDataError::NotSupported {
                operation: "refresh_session",
            }),
        }
    }

    async fn search_scrip(
        &self,
        exchange: &str,
        query: &str,
    ) -> Result<Vec<InstrumentRecord>, MarketDataError> {
        let body = json!({
            "exchange": exchange,
            "searchscrip": query,
        });
        // An empty search result arrives as a null payload.
        let rows = self
            .post::<Vec<InstrumentRecord>>("search_scrip", SEARCH_PATH, body, true)
            .await?
            .unwrap_or_default();
        Ok(rows)
    }

    async fn ltp(
        &self,
        exchange: &str,
        trading_symbol: &str,
        token: &str,
    ) -> Result<f64, MarketDataError> {
        let body = json!({
            "exchange": exchange,
            "tradingsymbol": trading_symbol,
            "symboltoken": token,
        });
        let data = Self::required("ltp", self.post::<LtpData>("ltp", LTP_PATH, body, true).await?)?;
        Ok(data.ltp)
    }
}
