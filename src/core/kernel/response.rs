use crate::core::errors::ExchangeError;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Decoded payload together with the server `Date` header of the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse<T> {
    pub date: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            date: self.date,
            data: f(self.data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorCode {
    Number(i64),
    Text(String),
}

impl ErrorCode {
    fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Number(n) => i32::try_from(*n).ok(),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    code: ErrorCode,
    msg: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    fn into_parts(self) -> Option<(i32, String)> {
        let code = self.code.as_i32()?;
        let message = self.msg.or(self.message)?;
        Some((code, message))
    }
}

/// Split a server answer into the success payload or an [`ExchangeError::ApiError`]
///
/// Any status of 400 or above is an API error no matter what the body contains.
pub fn classify(status: StatusCode, body: Vec<u8>) -> Result<Vec<u8>, ExchangeError> {
    if status.as_u16() < 400 {
        return Ok(body);
    }

    let parsed = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(ErrorBody::into_parts);
    let raw_body = String::from_utf8_lossy(&body).into_owned();

    let (code, message) = parsed.unwrap_or_else(|| {
        let message = if raw_body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string()
        } else {
            raw_body.clone()
        };
        (i32::from(status.as_u16()), message)
    });

    Err(ExchangeError::ApiError {
        code,
        message,
        status: status.as_u16(),
        body: raw_body,
    })
}

/// Caller-side decoding of a success payload
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ExchangeError> {
    serde_json::from_slice(body).map_err(ExchangeError::DecodeError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;

    fn status(code: u16) -> StatusCode {
        StatusCode::from_u16(code).unwrap()
    }

    #[test]
    fn test_success_returns_raw_bytes() {
        let body = br#"{"serverTime":1}"#.to_vec();
        assert_eq!(classify(StatusCode::OK, body.clone()).unwrap(), body);
    }

    #[test]
    fn test_structured_api_error() {
        let body = br#"{"code":-1021,"msg":"Timestamp outside recvWindow"}"#.to_vec();

        let err = classify(status(418), body).unwrap_err();

        match err {
            ExchangeError::ApiError {
                code,
                message,
                status,
                body,
            } => {
                assert_eq!(code, -1021);
                assert_eq!(message, "Timestamp outside recvWindow");
                assert_eq!(status, 418);
                assert!(body.contains("-1021"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_string_code_and_message_field() {
        let body = br#"{"code":"-2010","message":"Account has insufficient balance"}"#.to_vec();

        let err = classify(StatusCode::BAD_REQUEST, body).unwrap_err();

        assert_eq!(err.api_code(), Some(-2010));
        assert!(err.to_string().contains("insufficient balance"));
    }

    #[test]
    fn test_body_with_both_msg_and_message_keeps_code() {
        let body = br#"{"code":-1100,"msg":"Illegal characters","message":"Illegal characters"}"#.to_vec();

        let err = classify(StatusCode::BAD_REQUEST, body).unwrap_err();

        assert_eq!(err.api_code(), Some(-1100));
        assert!(err.to_string().contains("Illegal characters"));
    }

    #[test]
    fn test_unparsable_error_falls_back_to_status_and_body() {
        let err = classify(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>".to_vec()).unwrap_err();

        match err {
            ExchangeError::ApiError {
                code,
                message,
                status,
                ..
            } => {
                assert_eq!(code, 502);
                assert_eq!(status, 502);
                assert_eq!(message, "<html>bad gateway</html>");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_error_body_uses_reason_phrase() {
        let err = classify(StatusCode::SERVICE_UNAVAILABLE, Vec::new()).unwrap_err();
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn test_error_status_never_succeeds() {
        let success_shape =
            br#"{"lastUpdateId":1,"bids":[["9000.00","10"]],"asks":[["9100.00","5"]]}"#;

        for code in [400, 401, 403, 404, 418, 429, 500, 503] {
            let err = classify(status(code), success_shape.to_vec()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Api);
        }
    }

    #[test]
    fn test_decode_failure_is_decode_error() {
        #[derive(Debug, Deserialize)]
        struct ServerTime {
            #[serde(rename = "serverTime")]
            _server_time: i64,
        }

        let err = decode::<ServerTime>(br#"{"unexpected":true}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
