//! Bearer-authenticated client for the application API
//!
//! A 401 on a first attempt is recovered at most once: by picking up a token
//! that a concurrent refresh already stored, or by joining (or leading) a
//! refresh through the shared [`RefreshCoordinator`]. When recovery fails the
//! leader ends the session and sends the user to the login entry point.

use std::sync::Arc;

use pingauth_core::{Navigator, RefreshCoordinator, RefreshRole, SessionController, TokenStore};
use pingauth_domain::{AuthError, Result};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::envelope::ApiResponse;
use super::transport::HttpTransport;

/// One send of a request, with the bearer it carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAttempt {
    pub number: u8,
    pub bearer: Option<String>,
}

impl RequestAttempt {
    pub fn first(bearer: Option<String>) -> Self {
        Self { number: 1, bearer }
    }

    pub fn retry(&self, bearer: Option<String>) -> Self {
        Self { number: self.number + 1, bearer }
    }

    pub fn is_retry(&self) -> bool {
        self.number > 1
    }
}

/// Immutable description of an API call; every attempt is built from it.
#[derive(Debug, Clone)]
struct ApiRequest {
    method: Method,
    url: String,
    body: Option<Value>,
}

/// Application API client that attaches the session's bearer token
pub struct AuthenticatedHttpClient {
    transport: HttpTransport,
    base_url: Option<String>,
    store: Arc<TokenStore>,
    refresher: Arc<RefreshCoordinator>,
    navigator: Arc<dyn Navigator>,
    session: Option<SessionController>,
    login_path: String,
}

impl AuthenticatedHttpClient {
    pub fn new(
        transport: HttpTransport,
        store: Arc<TokenStore>,
        refresher: Arc<RefreshCoordinator>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: None,
            store,
            refresher,
            navigator,
            session: None,
            login_path: login_path.into(),
        }
    }

    /// Report sessions ended by a failed 401 recovery to `session`, so its
    /// state and refresh loop follow the cleared store.
    pub fn with_session(mut self, session: SessionController) -> Self {
        self.session = Some(session);
        self
    }

    /// Resolve relative paths against `base_url`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Send a request with the current bearer and recover a single 401.
    ///
    /// Non-success responses other than a recoverable 401 are returned as
    /// responses. A 401 on the retried attempt is returned as-is.
    ///
    /// # Errors
    /// - `Network` / `Timeout` for transport failures
    /// - the refresh error when the 401 could not be recovered; the session
    ///   has been cleared and the navigator sent to the login path by then
    #[instrument(skip(self, body))]
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Response> {
        let request = ApiRequest { method, url: self.resolve(path)?, body };

        let first = RequestAttempt::first(self.store.access_token());
        let response = self.dispatch(&request, &first).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let retry = self.recover(&first).await?;
        self.dispatch(&request, &retry).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, None).await?;
        decode_json(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, Some(to_body(body)?)).await?;
        decode_json(response).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::PUT, path, Some(to_body(body)?)).await?;
        decode_json(response).await
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::PATCH, path, Some(to_body(body)?)).await?;
        decode_json(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.send(Method::DELETE, path, None).await?;
        ensure_success(response).await.map(|_| ())
    }

    /// Like [`send`](Self::send) followed by JSON decoding, folded into an
    /// [`ApiResponse`] instead of an error.
    pub async fn request_envelope<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResponse<T> {
        let result = match self.send(method, path, body).await {
            Ok(response) => decode_json(response).await,
            Err(err) => Err(err),
        };
        result.into()
    }

    fn resolve(&self, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }

        match &self.base_url {
            Some(base) => Ok(format!("{base}/{}", path.trim_start_matches('/'))),
            None => Err(AuthError::Configuration(format!(
                "relative path '{path}' requires an API base URL"
            ))),
        }
    }

    async fn dispatch(&self, request: &ApiRequest, attempt: &RequestAttempt) -> Result<Response> {
        let mut builder = self.transport.request(request.method.clone(), &request.url);
        if let Some(bearer) = &attempt.bearer {
            builder = builder.bearer_auth(bearer);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(attempt = attempt.number, authenticated = attempt.bearer.is_some(), "api_request");
        self.transport.send(builder).await
    }

    /// Decide how to retry a first attempt that got a 401.
    async fn recover(&self, first: &RequestAttempt) -> Result<RequestAttempt> {
        let current = self.store.access_token();

        if current.is_some() && current != first.bearer {
            debug!("api_retry_with_refreshed_token");
            return Ok(first.retry(current));
        }

        if first.bearer.is_some() && current.is_none() {
            debug!("api_session_already_ended");
            return Err(AuthError::NotAuthenticated);
        }

        let outcome = self.refresher.run().await;
        match outcome.result {
            Ok(token) => Ok(first.retry(Some(token))),
            Err(err) => {
                if outcome.role == RefreshRole::Leader {
                    self.end_session(&err);
                }
                Err(err)
            }
        }
    }

    fn end_session(&self, err: &AuthError) {
        warn!(kind = err.label(), error = %err, "api_session_ended");
        match &self.session {
            Some(session) => {
                session.end_rejected_session();
            }
            None => self.store.clear(),
        }
        self.navigator.navigate(&self.login_path);
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|e| AuthError::Configuration(format!("request body is not serialisable: {e}")))
}

/// Map a non-success response to `Http { status, message }`.
///
/// The message is the body's `message` or `error` field, the raw body, or the
/// status reason, in that order.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let from_json = serde_json::from_str::<Value>(&text).ok().and_then(|body| {
        ["message", "error"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    let message = from_json
        .or_else(|| (!text.trim().is_empty()).then(|| text.trim().to_string()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    Err(AuthError::Http { status: status.as_u16(), message })
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = ensure_success(response).await?;
    let status = response.status().as_u16();
    let bytes = response.bytes().await.map_err(|e| AuthError::Network(e.to_string()))?;

    let slice: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
    serde_json::from_slice(slice)
        .map_err(|e| AuthError::Http { status, message: format!("invalid response body: {e}") })
}
