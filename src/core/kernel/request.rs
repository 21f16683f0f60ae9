use crate::core::errors::ExchangeError;
use crate::core::kernel::params::{ParamValue, Params, Placement};
use crate::core::kernel::signer::{append_signature, Signer, SIGNATURE_KEY};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;

pub const TIMESTAMP_KEY: &str = "timestamp";
pub const RECV_WINDOW_KEY: &str = "recvWindow";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Authentication requirement of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityType {
    /// Public endpoint
    None,
    /// Requires the API key header
    ApiKey,
    /// Requires the API key header, a timestamp and a signature
    Signed,
}

impl SecurityType {
    pub const fn requires_api_key(self) -> bool {
        matches!(self, Self::ApiKey | Self::Signed)
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Signed)
    }
}

/// Per-call request descriptor
///
/// Endpoints build one of these for every call. The security type is fixed at
/// construction; parameters, headers and the receive window may be changed until the
/// request is handed to [`RequestBuilder::build`].
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    endpoint: String,
    security: SecurityType,
    query: Params,
    form: Params,
    headers: Vec<(String, String)>,
    recv_window: u64,
    required: Vec<&'static str>,
    required_any: Vec<&'static [&'static str]>,
}

impl Request {
    pub fn new(method: Method, endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            security,
            query: Params::new(),
            form: Params::new(),
            headers: Vec::new(),
            recv_window: 0,
            required: Vec::new(),
            required_any: Vec::new(),
        }
    }

    pub fn get(endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self::new(Method::GET, endpoint, security)
    }

    pub fn post(endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self::new(Method::POST, endpoint, security)
    }

    pub fn put(endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self::new(Method::PUT, endpoint, security)
    }

    pub fn delete(endpoint: impl Into<String>, security: SecurityType) -> Self {
        Self::new(Method::DELETE, endpoint, security)
    }

    /// Set a query string parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set_param(key, value);
        self
    }

    /// Set a form body parameter
    pub fn form_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set_form_param(key, value);
        self
    }

    /// Set a parameter only when a value is present
    pub fn optional_param<V: Into<ParamValue>>(
        mut self,
        placement: Placement,
        key: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        if let Some(value) = value {
            match placement {
                Placement::Query => self.set_param(key, value),
                Placement::Body => self.set_form_param(key, value),
            }
        }
        self
    }

    /// Declare a parameter that must be present and non-empty at build time
    pub fn require(mut self, key: &'static str) -> Self {
        self.required.push(key);
        self
    }

    /// Declare that at least one of `keys` must be present and non-empty
    pub fn require_any(mut self, keys: &'static [&'static str]) -> Self {
        self.required_any.push(keys);
        self
    }

    fn has_value(&self, key: &str) -> bool {
        self.query
            .get(key)
            .or_else(|| self.form.get(key))
            .is_some_and(|v| !v.is_empty())
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.query.set(key, value);
    }

    pub fn set_form_param(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.form.set(key, value);
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.headers.push((name, value));
        }
    }

    pub fn set_recv_window(&mut self, recv_window: u64) {
        self.recv_window = recv_window;
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub const fn security(&self) -> SecurityType {
        self.security
    }

    pub fn query(&self) -> &Params {
        &self.query
    }

    pub fn form(&self) -> &Params {
        &self.form
    }

    pub const fn recv_window(&self) -> u64 {
        self.recv_window
    }

    fn validate(&self) -> Result<(), ExchangeError> {
        if !self.endpoint.starts_with('/') {
            return Err(ExchangeError::InvalidParameters(format!(
                "endpoint must start with '/': {}",
                self.endpoint
            )));
        }

        if let Some(key) = self.required.iter().find(|k| !self.has_value(k)) {
            return Err(ExchangeError::InvalidParameters(format!(
                "missing required parameter '{}'",
                key
            )));
        }

        if let Some(keys) = self
            .required_any
            .iter()
            .find(|keys| !keys.iter().any(|k| self.has_value(k)))
        {
            return Err(ExchangeError::InvalidParameters(format!(
                "one of {:?} is required",
                keys
            )));
        }

        if let Some(key) = self.query.keys().find(|k| self.form.contains(k)) {
            return Err(ExchangeError::InvalidParameters(format!(
                "parameter '{}' set in both query and body",
                key
            )));
        }

        for reserved in [TIMESTAMP_KEY, SIGNATURE_KEY] {
            if self.query.contains(reserved) || self.form.contains(reserved) {
                return Err(ExchangeError::InvalidParameters(format!(
                    "parameter '{}' is managed by the client",
                    reserved
                )));
            }
        }

        Ok(())
    }
}

/// Mutation applied to a [`Request`] before validation
pub struct RequestOption(Box<dyn FnOnce(&mut Request) + Send>);

impl RequestOption {
    pub fn new(f: impl FnOnce(&mut Request) + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Server-tolerated time skew in milliseconds; ignored when zero
    pub fn recv_window(recv_window: u64) -> Self {
        Self::new(move |r| r.set_recv_window(recv_window))
    }

    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        Self::new(move |r| r.set_header(name, value))
    }

    fn apply(self, request: &mut Request) {
        (self.0)(request);
    }
}

impl std::fmt::Debug for RequestOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOption").finish_non_exhaustive()
    }
}

/// Turns a [`Request`] into a [`BuiltRequest`]
///
/// Applies options, validates, injects `recvWindow` and `timestamp`, then encodes
/// the query string and form body. Performs no I/O.
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    base_url: &'a str,
    time_offset: i64,
}

impl<'a> RequestBuilder<'a> {
    pub const fn new(base_url: &'a str, time_offset: i64) -> Self {
        Self {
            base_url,
            time_offset,
        }
    }

    /// Build using the current system time
    pub fn build(
        &self,
        request: Request,
        options: Vec<RequestOption>,
    ) -> Result<BuiltRequest, ExchangeError> {
        self.build_at(request, options, current_timestamp()?)
    }

    /// Build as if the local clock read `now_ms`
    pub fn build_at(
        &self,
        mut request: Request,
        options: Vec<RequestOption>,
        now_ms: i64,
    ) -> Result<BuiltRequest, ExchangeError> {
        for option in options {
            option.apply(&mut request);
        }
        request.validate()?;

        if request.recv_window > 0 {
            request.query.set(RECV_WINDOW_KEY, request.recv_window);
        }
        if request.security.is_signed() {
            let timestamp = now_ms.checked_sub(self.time_offset).ok_or_else(|| {
                ExchangeError::InvariantViolation(format!(
                    "clock offset {} overflows timestamp at {}",
                    self.time_offset, now_ms
                ))
            })?;
            request.query.set(TIMESTAMP_KEY, timestamp);
        }

        let query_string = request.query.encode();
        let body = request.form.encode();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ExchangeError::InvalidParameters(format!("invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ExchangeError::InvalidParameters(format!("invalid header value: {}", e))
            })?;
            headers.insert(name, value);
        }
        if !body.is_empty() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        }

        Ok(BuiltRequest {
            method: request.method,
            url: format!("{}{}", self.base_url, request.endpoint),
            endpoint: request.endpoint,
            security: request.security,
            query_string,
            body,
            headers,
            signed: false,
        })
    }
}

/// A fully encoded request
///
/// Exposes no way to add parameters: the only transition left is [`BuiltRequest::sign`].
#[derive(Debug, Clone)]
pub struct BuiltRequest {
    method: Method,
    url: String,
    endpoint: String,
    security: SecurityType,
    query_string: String,
    body: String,
    headers: HeaderMap,
    signed: bool,
}

impl BuiltRequest {
    /// Append the signature over `query || body` as the final query parameter
    pub fn sign(mut self, signer: &dyn Signer) -> Result<Self, ExchangeError> {
        if self.signed {
            return Err(ExchangeError::InvariantViolation(
                "request is already signed".to_string(),
            ));
        }
        let signature = signer.signature(&self.query_string, &self.body)?;
        self.query_string = append_signature(&self.query_string, &signature);
        self.signed = true;
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub const fn security(&self) -> SecurityType {
        self.security
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub const fn is_signed(&self) -> bool {
        self.signed
    }

    /// Base URL + path + encoded query
    pub fn full_url(&self) -> String {
        if self.query_string.is_empty() {
            self.url.clone()
        } else {
            format!("{}?{}", self.url, self.query_string)
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
pub fn current_timestamp() -> Result<i64, ExchangeError> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .map_err(|e| ExchangeError::InvariantViolation(format!("System time error: {}", e)))
}
