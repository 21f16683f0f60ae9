use crate::core::config::ConfigError;
use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, DATE};
use reqwest::{Client, Method, Proxy, StatusCode};
use std::time::Duration;
use tracing::{instrument, trace};

/// A request ready to be put on the wire
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Whatever the server answered, before classification
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }
}

/// Pluggable HTTP execution
///
/// Implementations perform exactly one attempt and report network failures as
/// errors; any status code the server returns is a successful execution.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse, ExchangeError>;
}

/// `Transport` backed by reqwest
///
/// Idle connections are never kept: every request opens and closes its own
/// connection.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Talk to the exchange directly
    pub fn direct(timeout: Duration) -> Result<Self, ExchangeError> {
        Self::build(Self::base_builder(timeout))
    }

    /// Route every request through an HTTP(S) proxy
    pub fn proxied(proxy_url: &str, timeout: Duration) -> Result<Self, ExchangeError> {
        let proxy = Proxy::all(proxy_url).map_err(|e| {
            ExchangeError::ConfigError(ConfigError::InvalidConfiguration(
                format!("Invalid proxy url '{}': {}", proxy_url, e),
            ))
        })?;
        Self::build(Self::base_builder(timeout).proxy(proxy))
    }

    fn base_builder(timeout: Duration) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(timeout)
            .user_agent("LotusX/1.0")
            .pool_max_idle_per_host(0)
    }

    fn build(builder: reqwest::ClientBuilder) -> Result<Self, ExchangeError> {
        let client = builder.build().map_err(|e| {
            ExchangeError::ConfigError(ConfigError::InvalidConfiguration(
                format!("Failed to build HTTP client: {}", e),
            ))
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: HttpRequest) -> Result<RawResponse, ExchangeError> {
        let mut headers = request.headers;
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        trace!(status = %status, bytes = body.len(), "Response received");

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// The server `Date` header, which must be present exactly once
pub fn capture_timestamp(headers: &HeaderMap) -> Result<String, ExchangeError> {
    let mut values = headers.get_all(DATE).iter();

    let value = match (values.next(), values.next()) {
        (Some(value), None) => value,
        (None, _) => {
            return Err(ExchangeError::InvariantViolation(
                "response carries no Date header".to_string(),
            ))
        }
        (Some(_), Some(_)) => {
            return Err(ExchangeError::InvariantViolation(format!(
                "response carries {} Date header values",
                headers.get_all(DATE).iter().count()
            )))
        }
    };

    value
        .to_str()
        .map(str::to_string)
        .map_err(|e| ExchangeError::InvariantViolation(format!("unreadable Date header: {}", e)))
}
