pub mod account;
pub mod market_data;
pub mod trading;
pub mod types;

use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{RestClient, RestClientBuilder, Transport};
use std::sync::Arc;

pub use account::{AccountInfoRequest, ListenKeyRequest};
pub use market_data::{OrderBookRequest, ServerTimeRequest};
pub use trading::{CancelOrderRequest, NewOrderRequest};
pub use types::{
    BinanceAccountInfo, BinanceBalance, BinanceCancelOrderResponse, BinanceListenKey,
    BinanceOrderBook, BinanceOrderResponse, BinanceServerTime,
};

/// Binance spot REST client
///
/// Every method is one pass through the request pipeline of the wrapped
/// [`RestClient`]. Clones share the underlying client, including its clock offset.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    rest: RestClient,
}

impl BinanceClient {
    /// Create a client talking to Binance over reqwest
    pub fn new(config: ExchangeConfig) -> Result<Self, ExchangeError> {
        create_binance_client(config, None)
    }

    /// Wrap an already configured REST client
    pub const fn with_rest(rest: RestClient) -> Self {
        Self { rest }
    }

    pub const fn rest(&self) -> &RestClient {
        &self.rest
    }
}

/// Create a Binance client, optionally over a caller-supplied transport
pub fn create_binance_client(
    config: ExchangeConfig,
    transport: Option<Arc<dyn Transport>>,
) -> Result<BinanceClient, ExchangeError> {
    let mut builder = RestClientBuilder::new(config).with_exchange_name("binance");
    if let Some(transport) = transport {
        builder = builder.with_transport(transport);
    }
    Ok(BinanceClient::with_rest(builder.build()?))
}
