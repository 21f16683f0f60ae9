use crate::core::errors::ExchangeError;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_KEY: &str = "signature";

/// Signer trait for request authentication
///
/// Implementations compute the signature over the finalized query string and body
/// string of a request. They must be pure: the same inputs always give the same
/// output.
pub trait Signer: Send + Sync {
    /// Compute the signature for `query || body`
    ///
    /// # Arguments
    /// * `query_string` - Encoded query string (without leading '?')
    /// * `body` - Encoded form body
    fn signature(&self, query_string: &str, body: &str) -> Result<String, ExchangeError>;
}

/// HMAC-SHA256 signer producing lowercase hex digests
pub struct HmacSigner {
    secret_key: Secret<String>,
}

impl HmacSigner {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key: Secret::new(secret_key),
        }
    }
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl Signer for HmacSigner {
    fn signature(&self, query_string: &str, body: &str) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.expose_secret().as_bytes())
            .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;

        mac.update(query_string.as_bytes());
        mac.update(body.as_bytes());

        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Append `signature=<hex>` to an encoded query string
pub fn append_signature(query_string: &str, signature: &str) -> String {
    let encoded = form_urlencoded::Serializer::new(String::new())
        .append_pair(SIGNATURE_KEY, signature)
        .finish();

    if query_string.is_empty() {
        encoded
    } else {
        format!("{}&{}", query_string, encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::params::decode_pairs;

    fn reference_hmac(secret: &str, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_signature_over_query_only() {
        let signer = HmacSigner::new("secret".to_string());
        let query = "symbol=BTCUSDT&side=BUY&timestamp=1000";

        let signature = signer.signature(query, "").unwrap();

        assert_eq!(signature, reference_hmac("secret", query));
        assert_eq!(signature.len(), 64);
        assert!(signature
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_signature_concatenates_query_and_body_without_separator() {
        let signer = HmacSigner::new("secret".to_string());

        let signature = signer
            .signature("timestamp=1000", "symbol=BTCUSDT&side=BUY")
            .unwrap();

        assert_eq!(
            signature,
            reference_hmac("secret", "timestamp=1000symbol=BTCUSDT&side=BUY")
        );
    }

    #[test]
    fn test_signature_is_deterministic() {
        let signer = HmacSigner::new("secret".to_string());
        let first = signer.signature("a=1", "b=2").unwrap();
        let second = signer.signature("a=1", "b=2").unwrap();
        assert_eq!(first, second);

        let other = HmacSigner::new("other".to_string());
        assert_ne!(first, other.signature("a=1", "b=2").unwrap());
    }

    #[test]
    fn test_binance_documented_vector() {
        // Example from the Binance REST API documentation
        let signer = HmacSigner::new(
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j".to_string(),
        );
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";

        assert_eq!(
            signer.signature(query, "").unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_append_signature() {
        assert_eq!(append_signature("", "abc"), "signature=abc");
        assert_eq!(append_signature("a=1", "abc"), "a=1&signature=abc");
    }

    #[test]
    fn test_signed_query_separates_back_into_parameters() {
        let signer = HmacSigner::new("secret".to_string());
        let query = "note=a%26b%3Dc+d&timestamp=1000";
        let signature = signer.signature(query, "").unwrap();

        let pairs = decode_pairs(&append_signature(query, &signature));

        assert_eq!(
            pairs,
            vec![
                ("note".to_string(), "a&b=c d".to_string()),
                ("timestamp".to_string(), "1000".to_string()),
                ("signature".to_string(), signature),
            ]
        );
    }
}
