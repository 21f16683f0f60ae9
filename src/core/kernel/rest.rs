use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::request::{BuiltRequest, Request, RequestBuilder, RequestOption};
use crate::core::kernel::response::{classify, decode, ApiResponse};
use crate::core::kernel::signer::{HmacSigner, Signer};
use crate::core::kernel::transport::{capture_timestamp, HttpRequest, ReqwestTransport, Transport};
use crate::core::traits::Endpoint;
use reqwest::header::{HeaderName, HeaderValue};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, trace};

pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-mbx-apikey");

/// Builder for creating [`RestClient`] instances
pub struct RestClientBuilder {
    config: ExchangeConfig,
    exchange_name: String,
    transport: Option<Arc<dyn Transport>>,
    signer: Option<Arc<dyn Signer>>,
    time_offset: i64,
}

impl RestClientBuilder {
    pub fn new(config: ExchangeConfig) -> Self {
        Self {
            config,
            exchange_name: "binance".to_string(),
            transport: None,
            signer: None,
            time_offset: 0,
        }
    }

    /// Exchange name used in log records
    pub fn with_exchange_name(mut self, exchange_name: impl Into<String>) -> Self {
        self.exchange_name = exchange_name.into();
        self
    }

    /// Execute requests through a custom transport instead of reqwest
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sign requests with a custom signer instead of HMAC over the secret key
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Initial local-minus-server clock difference in milliseconds
    pub const fn with_time_offset(mut self, time_offset: i64) -> Self {
        self.time_offset = time_offset;
        self
    }

    pub fn build(self) -> Result<RestClient, ExchangeError> {
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let timeout = Duration::from_secs(self.config.timeout_seconds);
                match &self.config.proxy_url {
                    Some(proxy_url) => Arc::new(ReqwestTransport::proxied(proxy_url, timeout)?),
                    None => Arc::new(ReqwestTransport::direct(timeout)?),
                }
            }
        };

        let signer = self.signer.or_else(|| {
            let secret_key = self.config.secret_key();
            (!secret_key.is_empty())
                .then(|| Arc::new(HmacSigner::new(secret_key.to_string())) as Arc<dyn Signer>)
        });

        Ok(RestClient {
            base_url: self.config.resolved_base_url(),
            api_key: Arc::new(self.config.api_key.clone()),
            exchange_name: self.exchange_name,
            transport,
            signer,
            time_offset: Arc::new(AtomicI64::new(self.time_offset)),
            debug: self.config.debug,
        })
    }
}

/// Exchange REST client
///
/// Holds credentials, the base URL and the transport, all fixed at construction. The
/// only mutable state is the clock offset, which is read once per request. Cloning is
/// cheap and clones share the clock offset.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    api_key: Arc<Secret<String>>,
    exchange_name: String,
    transport: Arc<dyn Transport>,
    signer: Option<Arc<dyn Signer>>,
    time_offset: Arc<AtomicI64>,
    debug: bool,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("exchange_name", &self.exchange_name)
            .field("has_signer", &self.signer.is_some())
            .field("time_offset", &self.time_offset())
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn builder(config: ExchangeConfig) -> RestClientBuilder {
        RestClientBuilder::new(config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Local-minus-server clock difference in milliseconds
    pub fn time_offset(&self) -> i64 {
        self.time_offset.load(Ordering::Acquire)
    }

    pub fn set_time_offset(&self, time_offset: i64) {
        self.time_offset.store(time_offset, Ordering::Release);
    }

    /// Call an endpoint and decode its declared response type
    pub async fn send<E: Endpoint + ?Sized>(
        &self,
        endpoint: &E,
        options: Vec<RequestOption>,
    ) -> Result<ApiResponse<E::Response>, ExchangeError> {
        self.call_json(endpoint.request(), options).await
    }

    /// Run the pipeline and decode a success payload into `T`
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        request: Request,
        options: Vec<RequestOption>,
    ) -> Result<ApiResponse<T>, ExchangeError> {
        let response = self.call(request, options).await?;
        let data = decode(&response.data)?;
        Ok(ApiResponse {
            date: response.date,
            data,
        })
    }

    /// Build, sign when required, execute once and classify
    #[instrument(
        skip(self, request, options),
        fields(exchange = %self.exchange_name, method = %request.method(), endpoint = %request.endpoint())
    )]
    pub async fn call(
        &self,
        request: Request,
        options: Vec<RequestOption>,
    ) -> Result<ApiResponse<Vec<u8>>, ExchangeError> {
        let built = self.prepare(request, options)?;
        let http = self.to_http(built)?;

        let raw = self.transport.execute(http).await?;

        if self.debug {
            debug!(
                status = %raw.status,
                body = %String::from_utf8_lossy(&raw.body),
                "response"
            );
        } else {
            trace!(status = %raw.status, bytes = raw.body.len(), "response");
        }

        // API errors win over a malformed Date header
        let date = capture_timestamp(&raw.headers);
        let data = classify(raw.status, raw.body)?;
        Ok(ApiResponse { date: date?, data })
    }

    /// Encode the request and sign it when its security type requires it
    pub fn prepare(
        &self,
        request: Request,
        options: Vec<RequestOption>,
    ) -> Result<BuiltRequest, ExchangeError> {
        let security = request.security();
        if security.requires_api_key() && self.api_key.expose_secret().is_empty() {
            return Err(ExchangeError::AuthError(format!(
                "{} requires an API key",
                request.endpoint()
            )));
        }

        let built =
            RequestBuilder::new(&self.base_url, self.time_offset()).build(request, options)?;

        if security.is_signed() {
            let signer = self.signer.as_deref().ok_or_else(|| {
                ExchangeError::AuthError(format!(
                    "{} requires a signature but no secret key is configured",
                    built.endpoint()
                ))
            })?;
            built.sign(signer)
        } else {
            Ok(built)
        }
    }

    fn to_http(&self, built: BuiltRequest) -> Result<HttpRequest, ExchangeError> {
        let mut headers = built.headers().clone();
        if built.security().requires_api_key() {
            let mut value = HeaderValue::from_str(self.api_key.expose_secret())
                .map_err(|e| ExchangeError::AuthError(format!("Invalid API key: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let url = built.full_url();
        if self.debug {
            debug!(url = %url, body = %built.body(), "request");
        }

        Ok(HttpRequest {
            method: built.method().clone(),
            url,
            headers,
            body: built.body().as_bytes().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;
    use crate::core::kernel::params::decode_pairs;
    use crate::core::kernel::request::{current_timestamp, SecurityType};
    use crate::core::kernel::transport::{MockTransport, RawResponse};
    use reqwest::header::{HeaderMap, DATE};
    use reqwest::StatusCode;

    const DATE_VALUE: &str = "Sun, 18 Oct 2026 10:00:00 GMT";

    fn ok_response(body: &str) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert(DATE, HeaderValue::from_static(DATE_VALUE));
        RawResponse::new(StatusCode::OK, headers, body.as_bytes().to_vec())
    }

    fn client(mock: MockTransport) -> RestClient {
        RestClient::builder(ExchangeConfig::new(
            "test_api_key".to_string(),
            "test_secret_key".to_string(),
        ))
        .with_transport(Arc::new(mock))
        .build()
        .unwrap()
    }

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        url.split_once('?')
            .map(|(_, q)| decode_pairs(q))
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_public_request_has_no_api_key() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .withf(|req| {
                req.headers.get(API_KEY_HEADER).is_none()
                    && req.url == "https://api.binance.com/api/v3/time"
            })
            .times(1)
            .returning(|_| Ok(ok_response(r#"{"serverTime":1}"#)));

        let response = client(mock)
            .call(Request::get("/api/v3/time", SecurityType::None), vec![])
            .await
            .unwrap();

        assert_eq!(response.date, DATE_VALUE);
        assert_eq!(response.data, br#"{"serverTime":1}"#.to_vec());
    }

    #[tokio::test]
    async fn test_api_key_request_has_header_but_no_signature() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .withf(|req| {
                req.headers.get(API_KEY_HEADER).map(HeaderValue::as_bytes)
                    == Some(b"test_api_key".as_slice())
                    && !req.url.contains("signature=")
                    && !req.url.contains("timestamp=")
            })
            .times(1)
            .returning(|_| Ok(ok_response(r#"{"listenKey":"abc"}"#)));

        client(mock)
            .call(Request::post("/api/v3/userDataStream", SecurityType::ApiKey), vec![])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_signed_request_carries_timestamp_and_trailing_signature() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .withf(|req| {
                let pairs = query_pairs(&req.url);
                let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
                let (query, _) = req.url.split_once('?').unwrap().1.rsplit_once("&signature=").unwrap();
                let expected = HmacSigner::new("test_secret_key".to_string())
                    .signature(query, std::str::from_utf8(&req.body).unwrap())
                    .unwrap();

                req.headers.get(API_KEY_HEADER).is_some()
                    && keys == ["recvWindow", "timestamp", "signature"]
                    && pairs[2].1 == expected
                    && req.body == b"symbol=BTCUSDT&side=BUY"
            })
            .times(1)
            .returning(|_| Ok(ok_response(r#"{"orderId":1}"#)));

        let request = Request::post("/api/v3/order", SecurityType::Signed)
            .form_param("symbol", "BTCUSDT")
            .form_param("side", "BUY");

        client(mock)
            .call(request, vec![RequestOption::recv_window(5_000)])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_clock_offset_is_subtracted() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|req| {
                let timestamp: i64 = query_pairs(&req.url)
                    .into_iter()
                    .find(|(k, _)| k == "timestamp")
                    .map(|(_, v)| v.parse().unwrap())
                    .unwrap();
                let expected = current_timestamp().unwrap() - 60_000;
                assert!((expected - timestamp).abs() < 5_000);
                Ok(ok_response("{}"))
            });

        let client = client(mock);
        client.set_time_offset(60_000);
        assert_eq!(client.time_offset(), 60_000);

        client
            .call(Request::get("/api/v3/account", SecurityType::Signed), vec![])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validation_failure_performs_no_io() {
        let mut mock = MockTransport::new();
        mock.expect_execute().never();

        let request = Request::get("/api/v3/depth", SecurityType::None).require("symbol");
        let err = client(mock).call(request, vec![]).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_signed_request_without_credentials() {
        let mut mock = MockTransport::new();
        mock.expect_execute().never();

        let client = RestClient::builder(ExchangeConfig::read_only())
            .with_transport(Arc::new(mock))
            .build()
            .unwrap();
        let err = client
            .call(Request::get("/api/v3/account", SecurityType::Signed), vec![])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_unchanged() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Err(ExchangeError::NetworkError("connection refused".to_string())));

        let err = client(mock)
            .call(Request::get("/api/v3/time", SecurityType::None), vec![])
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::NetworkError(msg) if msg == "connection refused"));
    }

    #[tokio::test]
    async fn test_duplicate_date_header_fails_fast() {
        let mut mock = MockTransport::new();
        mock.expect_execute().times(1).returning(|_| {
            let mut response = ok_response("{}");
            response
                .headers
                .append(DATE, HeaderValue::from_static(DATE_VALUE));
            Ok(response)
        });

        let err = client(mock)
            .call(Request::get("/api/v3/time", SecurityType::None), vec![])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[tokio::test]
    async fn test_api_error_without_date_header_keeps_code() {
        let mut mock = MockTransport::new();
        mock.expect_execute().times(1).returning(|_| {
            Ok(RawResponse::new(
                StatusCode::IM_A_TEAPOT,
                HeaderMap::new(),
                br#"{"code":-1021,"msg":"Timestamp outside recvWindow"}"#.to_vec(),
            ))
        });

        let err = client(mock)
            .call(Request::get("/api/v3/time", SecurityType::None), vec![])
            .await
            .unwrap_err();

        assert_eq!(err.api_code(), Some(-1021));
    }

    #[tokio::test]
    async fn test_missing_date_header_on_success_fails_fast() {
        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(RawResponse::new(StatusCode::OK, HeaderMap::new(), b"{}".to_vec())));

        let err = client(mock)
            .call(Request::get("/api/v3/time", SecurityType::None), vec![])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[tokio::test]
    async fn test_debug_logging_does_not_change_outcome() {
        let mut mock = MockTransport::new();
        mock.expect_execute().times(1).returning(|_| {
            let mut response = ok_response(r#"{"code":-1121,"msg":"Invalid symbol."}"#);
            response.status = StatusCode::BAD_REQUEST;
            Ok(response)
        });

        let client = RestClient::builder(
            ExchangeConfig::new("k".to_string(), "s".to_string()).debug(true),
        )
        .with_transport(Arc::new(mock))
        .build()
        .unwrap();

        let err = client
            .call(Request::get("/api/v3/depth", SecurityType::None), vec![])
            .await
            .unwrap_err();

        assert_eq!(err.api_code(), Some(-1121));
    }

    #[tokio::test]
    async fn test_decode_error_distinct_from_api_error() {
        #[derive(Debug, serde::Deserialize)]
        struct ServerTime {
            #[serde(rename = "serverTime")]
            _server_time: i64,
        }

        let mut mock = MockTransport::new();
        mock.expect_execute()
            .times(1)
            .returning(|_| Ok(ok_response("not json")));

        let err = client(mock)
            .call_json::<ServerTime>(Request::get("/api/v3/time", SecurityType::None), vec![])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
