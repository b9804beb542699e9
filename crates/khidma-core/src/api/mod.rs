//! Authenticated access to the dashboard REST backend.
//!
//! [`ApiClient::request`] forwards a call verbatim, attaching the session cookies and
//! bearer token. A `401` answer parks the caller behind a shared session refresh and
//! re-issues the call once the refresh settles; however many callers are rejected at the
//! same time, the backend only sees one renewal request.

mod refresh;
mod session;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
pub use session::{Session, SessionSnapshot, StoredCookie};

pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("khidma/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("authentication failed: {0}")]
    Authentication(#[from] RefreshFailure),
    #[error("request failed with status {status}: {body}")]
    Request { status: StatusCode, body: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid access token: {0}")]
    Token(String),
    #[error("{0}")]
    Invalid(String),
}

impl ApiError {
    /// HTTP status carried by a request failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status(),
            _ => None,
        }
    }
}

/// Connection parameters for an [`ApiClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub base_url: String,
    pub refresh_path: String,
    pub timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Invoked when the session can no longer be renewed.
pub type SessionExpiredCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct SessionHooks {
    pub on_expired: Option<SessionExpiredCallback>,
}

impl SessionHooks {
    pub fn on_expired(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            on_expired: Some(Arc::new(callback)),
        }
    }
}

/// Method, headers and pre-serialized body of a call.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<String>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: serde::Serialize + ?Sized>(self, value: &T) -> Result<Self, ApiError> {
        Ok(self.body(serde_json::to_string(value)?))
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Cheaply cloneable handle; clones share the session and refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    refresh_path: String,
    session: Session,
    refresh: RefreshCoordinator,
    hooks: SessionHooks,
    generation: AtomicU64,
}

impl ApiClient {
    pub fn new(settings: ClientSettings, hooks: SessionHooks) -> Result<Self, ApiError> {
        let base_url = settings.base_url.trim_end_matches('/').to_string();
        let invalid = |reason: String| ApiError::InvalidBaseUrl {
            url: settings.base_url.clone(),
            reason,
        };
        let origin = Url::parse(&format!("{base_url}/")).map_err(|err| invalid(err.to_string()))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", origin.scheme())));
        }
        let refresh_url = Url::parse(&format!("{base_url}{}", settings.refresh_path))
            .map_err(|err| invalid(err.to_string()))?;

        let session = Session::new(vec![origin, refresh_url]);
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .cookie_provider(session.cookie_store())
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                refresh_path: settings.refresh_path,
                session,
                refresh: RefreshCoordinator::new(),
                hooks,
                generation: AtomicU64::new(0),
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Whether a session refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    /// Perform a call, renewing an expired session once if the backend answers `401`.
    ///
    /// Success bodies are parsed as JSON; an empty body yields `Value::Null`.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let sent_with = self.inner.generation();
        let response = self.inner.send(path, &options).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_body(response).await;
        }

        if self.inner.generation() == sent_with {
            debug!(path, "session rejected; waiting for refresh");
            let inner = Arc::clone(&self.inner);
            self.inner
                .refresh
                .refresh(move || async move { inner.renew().await })
                .await?;
        } else {
            debug!(path, "session renewed while the request was in flight; retrying");
        }

        let retried = self.inner.send(path, &options).await?;
        read_body(retried).await
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let value = self.request(path, options).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Perform a call without the refresh-and-retry cycle. Used by the login and logout
    /// endpoints, where a `401` is an answer rather than an expired session.
    pub async fn request_once(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        let response = self.inner.send(path, &options).await?;
        read_body(response).await
    }
}

impl ClientInner {
    /// Number of successful renewals so far.
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        path: &str,
        options: &RequestOptions,
    ) -> Result<reqwest::Response, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(options.headers.clone());

        let mut builder = self
            .http
            .request(options.method.clone(), self.url(path))
            .headers(headers);
        if !options.headers.contains_key(AUTHORIZATION) {
            if let Some(token) = self.session.access_token() {
                builder = builder.bearer_auth(token);
            }
        }
        if let Some(body) = &options.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %options.method, path, "sending request");
        let response = builder.send().await?;
        debug!(method = %options.method, path, status = %response.status(), "received response");
        Ok(response)
    }

    async fn renew(&self) -> RefreshOutcome {
        info!(path = %self.refresh_path, "refreshing session");
        let outcome = match self.http.post(self.url(&self.refresh_path)).send().await {
            Ok(response) if response.status().is_success() => {
                match response.text().await {
                    Ok(body) => {
                        if let Some(token) = access_token_from(&body) {
                            self.session.set_access_token(Some(token));
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "refresh body unreadable; relying on cookies");
                    }
                }
                self.generation.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Ok(response) => Err(RefreshFailure::new(format!(
                "session refresh rejected with {}",
                response.status()
            ))),
            Err(err) => Err(RefreshFailure::new(format!(
                "session refresh request failed: {err}"
            ))),
        };

        match &outcome {
            Ok(()) => info!("session refreshed"),
            Err(failure) => {
                warn!(error = %failure, "session could not be refreshed");
                self.session.set_access_token(None);
                if let Some(callback) = &self.hooks.on_expired {
                    callback();
                }
            }
        }
        outcome
    }
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(rename = "accessToken")]
    access_token: String,
}

fn access_token_from(body: &str) -> Option<String> {
    serde_json::from_str::<TokenBody>(body)
        .ok()
        .map(|parsed| parsed.access_token)
        .filter(|token| !token.is_empty())
}

async fn read_body(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ApiError::Request { status, body });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}
