//! Scripted provider connection for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::InstrumentRecord;
use crate::provider::{ConnectionCapabilities, ProviderConnection, RefreshFlow};

/// A `ProviderConnection` whose behavior is scripted up front.
///
/// Counters record how often each operation was invoked so tests can
/// assert on call patterns, not just outcomes.
pub(crate) struct MockConnection {
    refresh_flows: &'static [RefreshFlow],
    failing_refresh: Vec<RefreshFlow>,
    failing_logins: AtomicUsize,
    login_count: AtomicUsize,
    refresh_log: Mutex<Vec<RefreshFlow>>,
    instruments: Option<Vec<InstrumentRecord>>,
    dump_fails: bool,
    dump_count: AtomicUsize,
    search_rows: Option<Vec<InstrumentRecord>>,
    search_count: AtomicUsize,
    ltp_script: Mutex<VecDeque<Result<f64, String>>>,
    ltp_count: AtomicUsize,
    ltp_delay: Option<Duration>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self {
            refresh_flows: &[],
            failing_refresh: Vec::new(),
            failing_logins: AtomicUsize::new(0),
            login_count: AtomicUsize::new(0),
            refresh_log: Mutex::new(Vec::new()),
            instruments: None,
            dump_fails: false,
            dump_count: AtomicUsize::new(0),
            search_rows: None,
            search_count: AtomicUsize::new(0),
            ltp_script: Mutex::new(VecDeque::new()),
            ltp_count: AtomicUsize::new(0),
            ltp_delay: None,
        }
    }

    /// Advertise refresh flows in the capability descriptor.
    pub fn with_refresh_flows(mut self, flows: &'static [RefreshFlow]) -> Self {
        self.refresh_flows = flows;
        self
    }

    /// Make the listed refresh flows fail when attempted.
    pub fn failing_refresh_flows(mut self, flows: &[RefreshFlow]) -> Self {
        self.failing_refresh = flows.to_vec();
        self
    }

    /// Reject the first `count` login attempts.
    pub fn failing_logins(self, count: usize) -> Self {
        self.failing_logins.store(count, Ordering::SeqCst);
        self
    }

    /// Support the native instrument dump, serving these rows.
    pub fn with_instruments(mut self, rows: Vec<InstrumentRecord>) -> Self {
        self.instruments = Some(rows);
        self
    }

    /// Advertise the native instrument dump but fail every call.
    pub fn with_failing_dump(mut self) -> Self {
        self.dump_fails = true;
        self
    }

    /// Support live search, serving these rows for every query.
    pub fn with_search_rows(mut self, rows: Vec<InstrumentRecord>) -> Self {
        self.search_rows = Some(rows);
        self
    }

    /// Script the LTP responses, consumed in order. `Err` strings become
    /// provider errors with that message.
    pub fn with_ltp_script(self, script: Vec<Result<f64, String>>) -> Self {
        *self.ltp_script.lock().unwrap() = script.into();
        self
    }

    /// Delay every LTP response (for timeout tests; uses tokio time).
    pub fn with_ltp_delay(mut self, delay: Duration) -> Self {
        self.ltp_delay = Some(delay);
        self
    }

    pub fn login_calls(&self) -> usize {
        self.login_count.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> Vec<RefreshFlow> {
        self.refresh_log.lock().unwrap().clone()
    }

    pub fn dump_calls(&self) -> usize {
        self.dump_count.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> usize {
        self.search_count.load(Ordering::SeqCst)
    }

    pub fn ltp_calls(&self) -> usize {
        self.ltp_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderConnection for MockConnection {
    fn capabilities(&self) -> ConnectionCapabilities {
        ConnectionCapabilities {
            refresh_flows: self.refresh_flows,
            supports_instrument_dump: self.instruments.is_some() || self.dump_fails,
            supports_search: self.search_rows.is_some(),
        }
    }

    async fn login(
        &self,
        _client_id: &str,
        _secret: &str,
        _totp_code: &str,
    ) -> Result<(), MarketDataError> {
        self.login_count.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_logins.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_logins.store(remaining - 1, Ordering::SeqCst);
            return Err(MarketDataError::ProviderError {
                operation: "login",
                message: "login rejected (AB7001)".to_string(),
            });
        }
        Ok(())
    }

    async fn refresh_session(
        &self,
        flow: RefreshFlow,
        _refresh_token: &str,
    ) -> Result<(), MarketDataError> {
        self.refresh_log.lock().unwrap().push(flow);
        if self.failing_refresh.contains(&flow) {
            return Err(MarketDataError::ProviderError {
                operation: "refresh_session",
                message: format!("refresh flow {flow} rejected"),
            });
        }
        Ok(())
    }

    async fn instrument_dump(
        &self,
        _exchange: &str,
    ) -> Result<Vec<InstrumentRecord>, MarketDataError> {
        self.dump_count.fetch_add(1, Ordering::SeqCst);
        if self.dump_fails {
            return Err(MarketDataError::ProviderError {
                operation: "instrument_dump",
                message: "instrument dump unavailable".to_string(),
            });
        }
        Ok(self.instruments.clone().unwrap_or_default())
    }

    async fn search_scrip(
        &self,
        _exchange: &str,
        _query: &str,
    ) -> Result<Vec<InstrumentRecord>, MarketDataError> {
        self.search_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.search_rows.clone().unwrap_or_default())
    }

    async fn ltp(
        &self,
        _exchange: &str,
        _trading_symbol: &str,
        _token: &str,
    ) -> Result<f64, MarketDataError> {
        self.ltp_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.ltp_delay {
            tokio::time::sleep(delay).await;
        }
        match self.ltp_script.lock().unwrap().pop_front() {
            Some(Ok(price)) => Ok(price),
            Some(Err(message)) => Err(MarketDataError::ProviderError {
                operation: "ltp",
                message,
            }),
            None => Err(MarketDataError::ProviderError {
                operation: "ltp",
                message: "ltp script exhausted".to_string(),
            }),
        }
    }
}

/// A minimal instrument row with a trading symbol and token.
pub(crate) fn record(trading_symbol: &str, token: &str) -> InstrumentRecord {
    InstrumentRecord {
        tradingsymbol: Some(trading_symbol.to_string()),
        symboltoken: Some(token.to_string()),
        ..Default::default()
    }
}
