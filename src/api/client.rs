use crate::api::types::{Credentials, Customer, LoginRequest};
use crate::api::{Endpoint, MeterApi};
use crate::config::ApiConfig;
use crate::error::{Result, SevError};
use crate::logging::{StructuredLogger, get_logger};
use reqwest::RequestBuilder;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct CachedToken {
    value: String,
    obtained_at: Instant,
}

impl CachedToken {
    fn new(value: String) -> Self {
        Self {
            value,
            obtained_at: Instant::now(),
        }
    }

    fn is_expired(&self, max_age: Option<Duration>) -> bool {
        max_age.is_some_and(|age| self.obtained_at.elapsed() >= age)
    }
}

/// Token-authenticated client for the SEV customer API
pub struct SevClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    timeout: Duration,
    token_max_age: Option<Duration>,
    // Held across a login so concurrent callers wait for it instead of
    // starting their own.
    token: Mutex<Option<CachedToken>>,
    login_attempts: AtomicU64,
    logger: StructuredLogger,
}

impl SevClient {
    /// Create a new client; `base_url` gets a trailing slash if missing
    pub fn new(
        credentials: Credentials,
        base_url: &str,
        timeout: Duration,
        token_max_age: Option<Duration>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().connect_timeout(timeout).build()?;
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            http,
            base_url,
            credentials,
            timeout,
            token_max_age,
            token: Mutex::new(None),
            login_attempts: AtomicU64::new(0),
            logger: get_logger("api"),
        })
    }

    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        Self::new(
            Credentials {
                user_name: cfg.user_name.clone(),
                api_key: cfg.api_key.clone(),
            },
            &cfg.base_url,
            cfg.request_timeout(),
            cfg.token_max_age(),
        )
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Log in and cache the resulting token.
    ///
    /// On any failure the cached token is cleared, so the next [`call`]
    /// logs in again.
    ///
    /// [`call`]: SevClient::call
    pub async fn authenticate(&self) -> Option<String> {
        let mut guard = self.token.lock().await;
        self.login_locked(&mut guard).await
    }

    /// Whether a token is currently cached
    pub async fn has_token(&self) -> bool {
        self.token.lock().await.is_some()
    }

    /// Drop the cached token; the next call logs in again
    pub async fn invalidate_token(&self) {
        *self.token.lock().await = None;
        self.logger.debug("Cached token invalidated");
    }

    /// POST `payload` to `endpoint` with the bearer token and parse the JSON answer.
    ///
    /// Returns `None` when no token can be obtained or the call fails for
    /// any reason; the failure is logged, not retried.
    pub async fn call(&self, endpoint: Endpoint, payload: &Value) -> Option<Value> {
        let Some(token) = self.ensure_token().await else {
            self.logger
                .warn(&format!("Skipping {}: not authenticated", endpoint));
            return None;
        };
        match self.try_call(endpoint, &token, payload).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.logger
                    .error(&format!("Error fetching energy data: {}", e));
                None
            }
        }
    }

    /// Customers, installations and meters visible to this account
    pub async fn get_available_meters(&self) -> Option<Vec<Customer>> {
        crate::api::available_meters(self).await
    }

    async fn ensure_token(&self) -> Option<String> {
        let seen = self.login_attempts.load(Ordering::Acquire);
        let mut guard = self.token.lock().await;
        match guard.as_ref() {
            Some(cached) if !cached.is_expired(self.token_max_age) => {
                return Some(cached.value.clone());
            }
            Some(_) => self
                .logger
                .info("Cached token reached its maximum age; logging in again"),
            None if self.login_attempts.load(Ordering::Acquire) != seen => {
                // A login finished while we were waiting and produced nothing
                return None;
            }
            None => {}
        }
        self.login_locked(&mut guard).await
    }

    async fn login_locked(&self, slot: &mut Option<CachedToken>) -> Option<String> {
        let outcome = self.try_login().await;
        // Counted once finished, so callers queued behind this login see it
        self.login_attempts.fetch_add(1, Ordering::AcqRel);
        match outcome {
            Ok(token) => {
                self.logger.debug("Obtained API token");
                *slot = Some(CachedToken::new(token.clone()));
                Some(token)
            }
            Err(e) => {
                *slot = None;
                self.logger.error(&format!("Check sev energy API: {}", e));
                None
            }
        }
    }

    async fn try_login(&self) -> Result<String> {
        let body = LoginRequest {
            user_name: &self.credentials.user_name,
            password: &self.credentials.api_key,
        };
        let request = self.http.post(self.url(Endpoint::Login)).json(&body);
        let bytes = self
            .exchange(Endpoint::Login, request)
            .await
            .map_err(|e| SevError::auth(format!("login failed: {}", e)))?;
        let token = String::from_utf8(bytes)
            .map_err(|_| SevError::auth("token is not valid UTF-8"))?;
        if token.trim().is_empty() {
            return Err(SevError::auth("login returned an empty token"));
        }
        Ok(token)
    }

    async fn try_call(&self, endpoint: Endpoint, token: &str, payload: &Value) -> Result<Value> {
        self.logger.debug(&format!("POST {}", self.url(endpoint)));
        let request = self
            .http
            .post(self.url(endpoint))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "application/json")
            .json(payload);
        let bytes = self.exchange(endpoint, request).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(SevError::empty_response(endpoint.path()));
        }
        let value: Value = serde_json::from_slice(&bytes)?;
        if value.is_null() {
            return Err(SevError::empty_response(endpoint.path()));
        }
        Ok(value)
    }

    /// Send the request and read the whole body, all under one deadline
    async fn exchange(&self, endpoint: Endpoint, request: RequestBuilder) -> Result<Vec<u8>> {
        let round_trip = async {
            let mut response = request
                .header(USER_AGENT, concat!("sevmeter/", env!("CARGO_PKG_VERSION")))
                .send()
                .await?;
            let status = response.status();
            self.logger
                .debug(&format!("{} status: {}", endpoint, status.as_u16()));
            if status.as_u16() >= 300 {
                return Err(SevError::status(endpoint.path(), status.as_u16()));
            }
            let mut body = Vec::new();
            while let Some(chunk) = response.chunk().await? {
                body.extend_from_slice(&chunk);
            }
            Ok::<Vec<u8>, SevError>(body)
        };
        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(result) => result,
            Err(_) => Err(SevError::timeout(endpoint.path(), self.timeout.as_secs())),
        }
    }
}

#[async_trait::async_trait]
impl MeterApi for SevClient {
    async fn call(&self, endpoint: Endpoint, payload: &Value) -> Option<Value> {
        SevClient::call(self, endpoint, payload).await
    }
}
