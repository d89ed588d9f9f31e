use std::time::Duration;

use pingauth_domain::constants::DEFAULT_HTTP_TIMEOUT_SECONDS;
use pingauth_domain::{AuthError, HttpConfig, Result};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::errors::map_transport_error;

/// Shared reqwest client with a bounded timeout.
///
/// Sends exactly once; retry policy belongs to the callers (the single 401
/// retry of the authenticated client).
#[derive(Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        let mut builder = Self::builder().timeout(config.timeout());
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder.build()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder.
    ///
    /// # Errors
    /// `Timeout` when the bound elapses, `Network` for other transport
    /// failures. Non-success statuses are returned as responses.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request =
            builder.build().map_err(|err| map_transport_error(err, self.timeout))?;

        let method = request.method().clone();
        let url = redacted(request.url());
        debug!(%method, %url, "sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                let status = response.status();
                debug!(%method, %url, %status, "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(map_transport_error(err, self.timeout))
            }
        }
    }
}

/// URL without its query string, which may carry codes or token hints.
fn redacted(url: &reqwest::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|err| AuthError::Configuration(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpTransport { client, timeout: self.timeout })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use reqwest::header::{HeaderMap, HeaderValue};
    use reqwest::StatusCode;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Validates `HttpTransport::send` for a plain response.
    ///
    /// Assertions:
    /// - Confirms a single request is made, even for server errors.
    /// - Confirms configured headers and user agent are sent.
    #[tokio::test]
    async fn test_sends_once_with_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "pingauth-test"))
            .and(header("x-client", "web"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-client", HeaderValue::from_static("web"));
        let transport = HttpTransport::builder()
            .user_agent("pingauth-test")
            .default_headers(headers)
            .build()
            .expect("transport");

        let response =
            transport.send(transport.request(Method::GET, server.uri())).await.expect("response");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    /// Validates `HttpTransport::send` against an elapsed timeout.
    ///
    /// Assertions:
    /// - Confirms the configured bound is reported in `Timeout`.
    #[tokio::test]
    async fn test_timeout_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport =
            HttpTransport::builder().timeout(Duration::from_millis(50)).build().expect("transport");
        let result = transport.send(transport.request(Method::GET, server.uri())).await;

        assert_eq!(result.unwrap_err(), AuthError::Timeout(Duration::from_millis(50)));
    }

    /// Validates `HttpTransport::send` for refused connections.
    ///
    /// Assertions:
    /// - Ensures the failure surfaces as `Network`.
    #[tokio::test]
    async fn test_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener); // release the port so that requests fail with ECONNREFUSED

        let transport = HttpTransport::new().expect("transport");
        let result = transport.send(transport.request(Method::GET, format!("http://{addr}"))).await;

        assert!(matches!(result, Err(AuthError::Network(_))));
    }

    /// Validates `HttpTransport::from_config`.
    ///
    /// Assertions:
    /// - Confirms the configured timeout is applied.
    #[test]
    fn test_from_config() {
        let config = HttpConfig { timeout_seconds: 7, ..HttpConfig::default() };
        let transport = HttpTransport::from_config(&config).expect("transport");
        assert_eq!(transport.timeout(), Duration::from_secs(7));
    }
}
