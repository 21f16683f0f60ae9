use crate::core::kernel::request::Request;
use serde::de::DeserializeOwned;

/// Descriptor of a single REST endpoint
///
/// An endpoint knows its path, method, security type and parameters, and the shape
/// of its success payload. It knows nothing about transport, signing or error
/// classification.
pub trait Endpoint {
    type Response: DeserializeOwned;

    fn request(&self) -> Request;
}
