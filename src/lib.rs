pub mod core;
pub mod exchanges;

pub use core::{
    config::ExchangeConfig,
    errors::{ErrorKind, ExchangeError},
    kernel::{ApiResponse, RestClient},
    traits::Endpoint,
};
pub use exchanges::binance::BinanceClient;
