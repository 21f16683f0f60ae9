//! Transport layer for the exchange REST API
//!
//! A call moves strictly forward through four stages:
//!
//! 1. [`RequestBuilder`] applies [`RequestOption`]s, validates the [`Request`],
//!    injects `recvWindow`/`timestamp` and encodes query and body.
//! 2. [`Signer`] appends `signature` for signed requests.
//! 3. [`Transport`] executes the request once; the client attaches the API key
//!    header and captures the server `Date` header.
//! 4. [`classify`] turns the status and body into a payload or an
//!    [`ExchangeError::ApiError`](crate::core::errors::ExchangeError::ApiError).
//!
//! There are no retries. Anything beyond a single attempt belongs to the caller.
//!
//! ```rust,no_run
//! use lotusx_spot::core::config::ExchangeConfig;
//! use lotusx_spot::core::kernel::*;
//!
//! # async fn example() -> Result<(), lotusx_spot::ExchangeError> {
//! let config = ExchangeConfig::new("api_key".to_string(), "secret_key".to_string());
//! let rest = RestClientBuilder::new(config).build()?;
//!
//! let request = Request::get("/api/v3/account", SecurityType::Signed);
//! let account: ApiResponse<serde_json::Value> = rest
//!     .call_json(request, vec![RequestOption::recv_window(5_000)])
//!     .await?;
//! println!("{} {}", account.date, account.data);
//! # Ok(())
//! # }
//! ```

pub mod params;
pub mod request;
pub mod response;
pub mod rest;
pub mod signer;
pub mod transport;

pub use params::{ParamValue, Params, Placement};
pub use request::{BuiltRequest, Request, RequestBuilder, RequestOption, SecurityType};
pub use response::{classify, decode, ApiResponse};
pub use rest::{RestClient, RestClientBuilder};
pub use signer::{HmacSigner, Signer};
pub use transport::{HttpRequest, RawResponse, ReqwestTransport, Transport};
