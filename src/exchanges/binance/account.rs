use super::types::{BinanceAccountInfo, BinanceListenKey};
use super::BinanceClient;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ApiResponse, Request, RequestOption, SecurityType};
use crate::core::traits::Endpoint;
use tracing::instrument;

/// `GET /api/v3/account`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountInfoRequest;

impl Endpoint for AccountInfoRequest {
    type Response = BinanceAccountInfo;

    fn request(&self) -> Request {
        Request::get("/api/v3/account", SecurityType::Signed)
    }
}

/// `POST /api/v3/userDataStream`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenKeyRequest;

impl Endpoint for ListenKeyRequest {
    type Response = BinanceListenKey;

    fn request(&self) -> Request {
        Request::post("/api/v3/userDataStream", SecurityType::ApiKey)
    }
}

impl BinanceClient {
    #[instrument(skip(self, options), fields(exchange = "binance"))]
    pub async fn account(
        &self,
        options: Vec<RequestOption>,
    ) -> Result<ApiResponse<BinanceAccountInfo>, ExchangeError> {
        self.rest().send(&AccountInfoRequest, options).await
    }

    /// Open a user data stream and return its listen key
    #[instrument(skip(self), fields(exchange = "binance"))]
    pub async fn start_user_stream(&self) -> Result<String, ExchangeError> {
        let response = self.rest().send(&ListenKeyRequest, vec![]).await?;
        Ok(response.data.listen_key)
    }
}
