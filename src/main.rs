use lotusx_spot::core::config::ExchangeConfig;
use lotusx_spot::core::kernel::RequestOption;
use lotusx_spot::BinanceClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // Reads BINANCE_API_KEY / BINANCE_SECRET_KEY; public endpoints work without them
    let config = ExchangeConfig::from_env("BINANCE")
        .unwrap_or_else(|_| ExchangeConfig::read_only())
        .testnet(true);
    let has_credentials = config.has_credentials();

    let binance = BinanceClient::new(config)?;

    let offset = binance.sync_time().await?;
    println!("Clock offset: {} ms", offset);

    let book = binance.order_book("BTCUSDT", Some(5), vec![]).await?;
    println!(
        "BTCUSDT order book at {} (update {})",
        book.date, book.data.last_update_id
    );
    for level in &book.data.bids {
        println!("  bid {} x {}", level.price(), level.quantity());
    }
    for level in &book.data.asks {
        println!("  ask {} x {}", level.price(), level.quantity());
    }

    if has_credentials {
        match binance.account(vec![RequestOption::recv_window(5_000)]).await {
            Ok(account) => {
                for balance in account.data.balances.iter().filter(|b| !b.free.is_zero()) {
                    println!("{}: {} free, {} locked", balance.asset, balance.free, balance.locked);
                }
            }
            Err(e) => println!("Error fetching account: {}", e),
        }
    }

    Ok(())
}
