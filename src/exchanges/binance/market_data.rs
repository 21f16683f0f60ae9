use super::types::{BinanceOrderBook, BinanceServerTime};
use super::BinanceClient;
use crate::core::errors::ExchangeError;
use crate::core::kernel::request::current_timestamp;
use crate::core::kernel::{ApiResponse, Placement, Request, RequestOption, SecurityType};
use crate::core::traits::Endpoint;
use tracing::{debug, instrument};

/// `GET /api/v3/depth`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookRequest {
    pub symbol: String,
    pub limit: Option<u32>,
}

impl OrderBookRequest {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            limit: None,
        }
    }

    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Endpoint for OrderBookRequest {
    type Response = BinanceOrderBook;

    fn request(&self) -> Request {
        Request::get("/api/v3/depth", SecurityType::None)
            .require("symbol")
            .param("symbol", &self.symbol)
            .optional_param(Placement::Query, "limit", self.limit)
    }
}

/// `GET /api/v3/time`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerTimeRequest;

impl Endpoint for ServerTimeRequest {
    type Response = BinanceServerTime;

    fn request(&self) -> Request {
        Request::get("/api/v3/time", SecurityType::None)
    }
}

impl BinanceClient {
    /// Order book depth for a symbol
    #[instrument(skip(self, options), fields(exchange = "binance", symbol = %symbol))]
    pub async fn order_book(
        &self,
        symbol: &str,
        limit: Option<u32>,
        options: Vec<RequestOption>,
    ) -> Result<ApiResponse<BinanceOrderBook>, ExchangeError> {
        let request = OrderBookRequest {
            symbol: symbol.to_string(),
            limit,
        };
        self.rest().send(&request, options).await
    }

    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn server_time(&self) -> Result<ApiResponse<BinanceServerTime>, ExchangeError> {
        self.rest().send(&ServerTimeRequest, vec![]).await
    }

    /// Measure local-minus-server clock drift and store it on the client
    ///
    /// Returns the new offset in milliseconds.
    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn sync_time(&self) -> Result<i64, ExchangeError> {
        let server_time = self.server_time().await?.data.server_time;
        let offset = current_timestamp()?
            .checked_sub(server_time)
            .ok_or_else(|| {
                ExchangeError::InvalidParameters(format!(
                    "server time {} is out of range",
                    server_time
                ))
            })?;
        self.rest().set_time_offset(offset);
        debug!(offset_ms = offset, "Clock offset updated");
        Ok(offset)
    }
}
