use super::types::{BinanceCancelOrderResponse, BinanceOrderResponse};
use super::BinanceClient;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ApiResponse, Placement, Request, RequestOption, SecurityType};
use crate::core::traits::Endpoint;
use crate::core::types::{NewOrderRespType, OrderSide, OrderType, TimeInForce};
use rust_decimal::Decimal;
use tracing::instrument;

/// `POST /api/v3/order`
///
/// Parameters travel in the form body; only `timestamp` and `signature` end up in
/// the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub time_in_force: Option<TimeInForce>,
    pub quantity: Option<Decimal>,
    pub quote_order_qty: Option<Decimal>,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub new_client_order_id: Option<String>,
    pub new_order_resp_type: Option<NewOrderRespType>,
}

impl NewOrderRequest {
    pub fn new(symbol: impl Into<String>, side: OrderSide, order_type: OrderType) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            time_in_force: None,
            quantity: None,
            quote_order_qty: None,
            price: None,
            stop_price: None,
            new_client_order_id: None,
            new_order_resp_type: None,
        }
    }

    /// Limit order, good till canceled
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self::new(symbol, side, OrderType::Limit)
            .time_in_force(TimeInForce::GTC)
            .quantity(quantity)
            .price(price)
    }

    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self::new(symbol, side, OrderType::Market).quantity(quantity)
    }

    pub const fn time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = Some(time_in_force);
        self
    }

    pub const fn quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub const fn quote_order_qty(mut self, quote_order_qty: Decimal) -> Self {
        self.quote_order_qty = Some(quote_order_qty);
        self
    }

    pub const fn price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub const fn stop_price(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    pub fn new_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.new_client_order_id = Some(id.into());
        self
    }

    pub const fn new_order_resp_type(mut self, resp_type: NewOrderRespType) -> Self {
        self.new_order_resp_type = Some(resp_type);
        self
    }
}

impl Endpoint for NewOrderRequest {
    type Response = BinanceOrderResponse;

    fn request(&self) -> Request {
        let mut request = Request::post("/api/v3/order", SecurityType::Signed)
            .require("symbol")
            .require_any(&["quantity", "quoteOrderQty"])
            .form_param("symbol", &self.symbol)
            .form_param("side", self.side.as_str())
            .form_param("type", self.order_type.as_str())
            .optional_param(
                Placement::Body,
                "timeInForce",
                self.time_in_force.map(TimeInForce::as_str),
            )
            .optional_param(Placement::Body, "quantity", self.quantity)
            .optional_param(Placement::Body, "quoteOrderQty", self.quote_order_qty)
            .optional_param(Placement::Body, "price", self.price)
            .optional_param(
                Placement::Body,
                "newClientOrderId",
                self.new_client_order_id.as_deref(),
            )
            .optional_param(Placement::Body, "stopPrice", self.stop_price)
            .optional_param(
                Placement::Body,
                "newOrderRespType",
                self.new_order_resp_type.map(NewOrderRespType::as_str),
            );

        if self.order_type.is_limit() {
            request = request.require("price").require("timeInForce");
        }
        request
    }
}

/// `DELETE /api/v3/order`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelOrderRequest {
    pub symbol: String,
    pub order_id: Option<i64>,
    pub orig_client_order_id: Option<String>,
}

impl CancelOrderRequest {
    pub fn by_order_id(symbol: impl Into<String>, order_id: i64) -> Self {
        Self {
            symbol: symbol.into(),
            order_id: Some(order_id),
            orig_client_order_id: None,
        }
    }

    pub fn by_client_order_id(
        symbol: impl Into<String>,
        orig_client_order_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            order_id: None,
            orig_client_order_id: Some(orig_client_order_id.into()),
        }
    }
}

impl Endpoint for CancelOrderRequest {
    type Response = BinanceCancelOrderResponse;

    fn request(&self) -> Request {
        Request::delete("/api/v3/order", SecurityType::Signed)
            .require("symbol")
            .require_any(&["orderId", "origClientOrderId"])
            .param("symbol", &self.symbol)
            .optional_param(Placement::Query, "orderId", self.order_id)
            .optional_param(
                Placement::Query,
                "origClientOrderId",
                self.orig_client_order_id.as_deref(),
            )
    }
}

impl BinanceClient {
    #[instrument(skip(self, order, options), fields(exchange = "binance", symbol = %order.symbol, side = %order.side))]
    pub async fn new_order(
        &self,
        order: &NewOrderRequest,
        options: Vec<RequestOption>,
    ) -> Result<ApiResponse<BinanceOrderResponse>, ExchangeError> {
        self.rest().send(order, options).await
    }

    #[instrument(skip(self, cancel, options), fields(exchange = "binance", symbol = %cancel.symbol))]
    pub async fn cancel_order(
        &self,
        cancel: &CancelOrderRequest,
        options: Vec<RequestOption>,
    ) -> Result<ApiResponse<BinanceCancelOrderResponse>, ExchangeError> {
        self.rest().send(cancel, options).await
    }
}
