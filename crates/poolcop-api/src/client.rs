// PoolCopilot HTTP client
//
// Wraps `reqwest::Client` with the API-key-for-token exchange, token
// budget tracking, and status retrieval. Callers only ever see the
// decoded status tree; token renewal happens transparently.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex as StdMutex, PoisonError};
use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use url::Url;

use crate::auth::{TOKEN_LIFETIME, TOKEN_REQUEST_BUDGET, Token};
use crate::error::Error;
use crate::models::{ErrorBody, TokenResponse};
use crate::transport::TransportConfig;

/// Production endpoint of the PoolCopilot API.
pub const DEFAULT_BASE_URL: &str = "https://poolcopilot.com/api/v1/";

/// Header carrying the access token on every authenticated request.
pub const TOKEN_HEADER: &str = "PoolCop-Token";

/// Async client for the PoolCopilot cloud API.
///
/// Holds the API key, exchanges it for short-lived tokens on demand, and
/// remembers the PoolCop id the key is bound to. One client serves one
/// device.
pub struct PoolCopilotClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    token_budget: u32,
    /// Request timeout the HTTP client was built with, when known.
    timeout: Option<Duration>,
    token: Mutex<Option<Token>>,
    poolcop_id: StdMutex<Option<String>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for PoolCopilotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolCopilotClient")
            .field("base_url", &self.base_url.as_str())
            .field("poolcop_id", &self.poolcop_id())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl PoolCopilotClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Client for the production API.
    pub fn new(api_key: SecretString, transport: &TransportConfig) -> Result<Self, Error> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, transport)
    }

    /// Client for an alternative endpoint (staging, mock server).
    pub fn with_base_url(
        base_url: &str,
        api_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let base_url = Self::normalize_base_url(base_url)?;
        let mut client = Self::with_client(http, base_url, api_key);
        client.timeout = Some(transport.timeout);
        Ok(client)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, api_key: SecretString) -> Self {
        Self {
            http,
            base_url,
            api_key,
            token_budget: TOKEN_REQUEST_BUDGET,
            timeout: None,
            token: Mutex::new(None),
            poolcop_id: StdMutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Override how many requests a single token may serve.
    pub fn with_token_budget(mut self, budget: u32) -> Self {
        self.token_budget = budget.max(1);
        self
    }

    /// Ensure the base URL ends with `/` so relative joins stay inside it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The PoolCop id bound to the API key, known after the first token exchange.
    pub fn poolcop_id(&self) -> Option<String> {
        self.poolcop_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ── Token handling ───────────────────────────────────────────────

    /// Exchange the API key for a fresh token.
    ///
    /// The token is stored for subsequent requests; the raw response is
    /// returned for callers interested in the device id.
    pub async fn token(&self) -> Result<TokenResponse, Error> {
        let mut guard = self.token.lock().await;
        let resp = self.request_token().await?;
        *guard = Some(self.token_from(&resp));
        Ok(resp)
    }

    async fn request_token(&self) -> Result<TokenResponse, Error> {
        self.ensure_open()?;
        let url = self.url("token")?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .form(&[("APIKEY", self.api_key.expose_secret())])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::InvalidApiKey);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&resp));
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        match serde_json::from_str::<TokenResponse>(&body) {
            Ok(token) => {
                if let Some(id) = token.poolcop_id() {
                    *self
                        .poolcop_id
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(id);
                }
                debug!(expires_in = ?token.expires_in, "token issued");
                Ok(token)
            }
            Err(e) => {
                // Some deployments answer a bad key with HTTP 200 and an error body.
                if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
                    if let Some(msg) = err.message() {
                        if msg.to_ascii_lowercase().contains("key") {
                            return Err(Error::InvalidApiKey);
                        }
                        return Err(Error::Api {
                            status: status.as_u16(),
                            message: msg,
                        });
                    }
                }
                Err(deserialization_error(&e, body))
            }
        }
    }

    fn token_from(&self, resp: &TokenResponse) -> Token {
        let lifetime = resp
            .expires_in
            .filter(|secs| *secs > 0)
            .map_or(TOKEN_LIFETIME, Duration::from_secs);
        Token::with_budget(
            SecretString::from(resp.token.clone()),
            lifetime,
            self.token_budget,
        )
    }

    /// Hand out a token for one request, renewing it when the budget is spent.
    async fn acquire_token(&self) -> Result<SecretString, Error> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_mut() {
            if token.is_usable() {
                trace!(remaining = token.remaining(), "reusing token");
                return Ok(token.consume());
            }
            debug!("token exhausted or expired, renewing");
        }

        let resp = self.request_token().await?;
        let token = guard.insert(self.token_from(&resp));
        Ok(token.consume())
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    // ── Status ───────────────────────────────────────────────────────

    /// Fetch the full status tree (`{"PoolCop": {...}}`).
    ///
    /// A token refused by the status endpoint is discarded and the request
    /// retried once with a fresh one.
    pub async fn status(&self) -> Result<Value, Error> {
        let url = self.url("status")?;

        for attempt in 0..2 {
            let token = self.acquire_token().await?;
            debug!("GET {url}");

            let resp = self
                .http
                .get(url.clone())
                .header(TOKEN_HEADER, token.expose_secret())
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;

            if resp.status() == StatusCode::UNAUTHORIZED {
                self.invalidate_token().await;
                if attempt == 0 {
                    debug!("token rejected, retrying with a fresh one");
                    continue;
                }
                warn!("fresh token rejected by status endpoint");
                return Err(Error::TokenRejected);
            }

            return self.parse_status(resp).await;
        }

        Err(Error::TokenRejected)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Drop the current token and refuse further requests.
    ///
    /// Idempotent; pooled connections are released when the client is dropped.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.invalidate_token().await;
        debug!("client closed");
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    // ── Error mapping ────────────────────────────────────────────────

    /// Classify a `reqwest` failure: timeouts and refused connections get
    /// their own variants, anything else stays a transport error.
    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.timeout.map_or(0, |t| t.as_secs()),
            }
        } else if err.is_connect() {
            Error::Connection(err.to_string())
        } else {
            Error::Transport(err)
        }
    }

    async fn parse_status(&self, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&resp));
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        let value: Value =
            serde_json::from_str(&body).map_err(|e| deserialization_error(&e, body.clone()))?;
        if !value.is_object() {
            return Err(Error::Deserialization {
                message: "status payload is not a JSON object".into(),
                body,
            });
        }
        Ok(value)
    }
}

// ── Response helpers ─────────────────────────────────────────────────

fn rate_limited(resp: &reqwest::Response) -> Error {
    let retry_after_secs = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(60);
    Error::RateLimited { retry_after_secs }
}

fn api_error(status: StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message())
        .unwrap_or_else(|| preview(body).to_owned());
    Error::Api {
        status: status.as_u16(),
        message,
    }
}

fn deserialization_error(err: &serde_json::Error, body: String) -> Error {
    Error::Deserialization {
        message: format!("{err} (body preview: {:?})", preview(&body)),
        body,
    }
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let url = PoolCopilotClient::normalize_base_url("https://example.test/api/v1")
            .expect("valid URL");
        assert_eq!(url.as_str(), "https://example.test/api/v1/");
        assert_eq!(
            url.join("status").expect("join").as_str(),
            "https://example.test/api/v1/status"
        );
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        let p = preview(&body);
        assert!(p.len() <= 200);
        assert!(body.starts_with(p));
    }

    #[test]
    fn api_error_prefers_json_message() {
        let err = api_error(StatusCode::BAD_GATEWAY, r#"{"error":"upstream down"}"#);
        assert!(
            matches!(err, Error::Api { status: 502, ref message } if message == "upstream down")
        );
    }
}
