mod alert;
mod config;
mod credentials;
mod mem;
mod startup;

use alert::bot::run_bot;
use alert::caller::Caller;
use alert::commands::AppContext;
use alert::telegram_log::run_telegram_log;
use config::Config;
use sniper_data::exchanges::binance::{BinanceAnnouncementsPart, BinancePairPart, BinanceWalletPart};
use sniper_data::exchanges::bithumb::{BithumbAnnouncementsPart, BithumbPairPart, BithumbWalletsPart};
use sniper_data::exchanges::coinbase::CoinbaseAnnouncementsPart;
use sniper_data::exchanges::coinbase_pro::{CoinbaseProAnnouncementsPart, CoinbaseProWalletsPart};
use sniper_data::exchanges::telegram::TelegramBufferPart;
use sniper_data::exchanges::twitter::{TwitterCredentials, TwitterStreamPart};
use sniper_data::exchanges::upbit::UpbitMarketPart;
use sniper_data::{CoinMarketCapClient, TriggerAction, TriggerExchange, TriggerManager};
use sniper_execution::exchange::{binance, bittrex, huobi};
use sniper_execution::{Account, TradeExchange, TradeManager};
use sniper_instrument::{Credential, CoinSource};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_BUY_AMOUNT_PCT: u32 = 50;

/// Concrete accounts kept alongside their `Arc<dyn TradeExchange>` handle so
/// exchange-specific supervisor tasks (listen-key keepalive, price-filter
/// refresh) can be spawned without downcasting a trait object.
struct TradeLayer {
    exchanges: Vec<Arc<dyn TradeExchange>>,
    binance_accounts: Vec<Arc<binance::BinanceAccount>>,
    bittrex_accounts: Vec<Arc<bittrex::BittrexAccount>>,
    huobi_accounts: Vec<Arc<huobi::HuobiAccount>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    dotenvy::dotenv().ok();
    let config = Config::load()?;

    let creds = credentials::load_credentials("credentials.yaml")?;
    let phone_accounts = credentials::load_phone_accounts("phone_numbers.yaml").unwrap_or_default();

    let (alerts, alert_receiver) = sniper_integration::alert_queue();

    let by_exchange = group_by_exchange(creds);
    let trade_layer = build_trade_layer(&by_exchange, &config, alerts.clone()).await;

    for exchange in &trade_layer.exchanges {
        for account in exchange.accounts() {
            if let Err(e) = account.init().await {
                error!(account = %account.label(), error = %e, "account init failed, dropping from active list");
                alerts.send(format!("[{}] account init failed: {e}", account.label()));
                exchange.remove_account(&account.label());
            }
        }
    }

    spawn_trade_supervisors(&trade_layer);

    let caller = Caller::new(
        phone_accounts,
        config.twilio_from_number.clone(),
        config.twilio_account_sid.clone(),
        config.twilio_auth_key.clone(),
    );
    let caller: Arc<dyn sniper_data::CallDispatcher> = Arc::new(caller);

    let trade_manager = Arc::new(TradeManager::new(trade_layer.exchanges.clone(), config.debug));
    let router: Arc<dyn sniper_data::CoinRouter> = trade_manager;

    let metadata = Arc::new(CoinMarketCapClient::new("https://pro-api.coinmarketcap.com"));

    let mut manager = TriggerManager::new();
    let (telegram_krw, telegram_btc) =
        register_trigger_exchanges(&mut manager, &config, alerts.clone(), metadata, caller, router);
    let manager = Arc::new(manager);
    manager.clone().init().await;

    let ctx = Arc::new(AppContext {
        config: config.clone(),
        trigger_manager: manager.clone(),
        trade_exchanges: trade_layer.exchanges.clone(),
        telegram_krw,
        telegram_btc,
        alerts: alerts.clone(),
    });

    tokio::spawn(run_telegram_log(config.bot_token.clone(), config.log_channel_id, alert_receiver));
    tokio::spawn(run_bot(ctx));

    if let Some(interval) = config.mem_check_interval {
        tokio::spawn(mem::run_memory_watchdog(interval, manager.clone()));
    }

    startup::send_start_message(&alerts, &trade_layer.exchanges, config.limit_order_markup, config.order_cancel_delay);
    info!("listing sniper started");

    tokio::signal::ctrl_c().await?;
    info!("SIGINT received, shutting down");
    Ok(())
}

fn group_by_exchange(creds: Vec<Credential>) -> HashMap<String, Vec<Credential>> {
    let mut by_exchange: HashMap<String, Vec<Credential>> = HashMap::new();
    for cred in creds {
        by_exchange.entry(cred.exchange_name.to_string()).or_default().push(cred);
    }
    by_exchange
}

async fn build_trade_layer(
    by_exchange: &HashMap<String, Vec<Credential>>,
    config: &Config,
    alerts: sniper_integration::AlertSender,
) -> TradeLayer {
    let mut exchanges: Vec<Arc<dyn TradeExchange>> = Vec::new();
    let mut binance_accounts = Vec::new();
    let mut bittrex_accounts = Vec::new();
    let mut huobi_accounts = Vec::new();
    let buy_amounts: HashMap<String, u32> = HashMap::from([("BTC".to_string(), DEFAULT_BUY_AMOUNT_PCT)]);
    let http_client = sniper_integration::http::HttpClient::new();

    if let Some(creds) = by_exchange.get("binance") {
        let concrete: Vec<Arc<binance::BinanceAccount>> =
            creds.iter().cloned().map(|c| Arc::new(binance::BinanceAccount::new(c))).collect();
        let trait_accounts: Vec<Arc<dyn Account>> = concrete.iter().cloned().map(|a| a as Arc<dyn Account>).collect();
        let exchange = Arc::new(binance::BinanceExchange::new(
            buy_amounts.clone(),
            config.limit_order_markup,
            config.order_cancel_delay,
            trait_accounts,
            alerts.clone(),
        ));
        if let Err(e) = exchange.seed_tickers(&http_client).await {
            error!(error = %e, "failed to seed binance tickers");
        }
        binance_accounts = concrete;
        exchanges.push(exchange);
    }

    if let Some(creds) = by_exchange.get("bittrex") {
        let concrete: Vec<Arc<bittrex::BittrexAccount>> =
            creds.iter().cloned().map(|c| Arc::new(bittrex::BittrexAccount::new(c))).collect();
        let trait_accounts: Vec<Arc<dyn Account>> = concrete.iter().cloned().map(|a| a as Arc<dyn Account>).collect();
        let exchange = Arc::new(bittrex::BittrexExchange::new(
            buy_amounts.clone(),
            config.limit_order_markup,
            config.order_cancel_delay,
            trait_accounts,
            alerts.clone(),
        ));
        if let Err(e) = exchange.seed_tickers(&http_client).await {
            error!(error = %e, "failed to seed bittrex tickers");
        }
        bittrex_accounts = concrete;
        exchanges.push(exchange);
    }

    if let Some(creds) = by_exchange.get("huobi") {
        let concrete: Vec<Arc<huobi::HuobiAccount>> =
            creds.iter().cloned().map(|c| Arc::new(huobi::HuobiAccount::new(c))).collect();
        let trait_accounts: Vec<Arc<dyn Account>> = concrete.iter().cloned().map(|a| a as Arc<dyn Account>).collect();
        let exchange = Arc::new(huobi::HuobiExchange::new(
            buy_amounts.clone(),
            config.limit_order_markup,
            config.order_cancel_delay,
            trait_accounts,
            alerts.clone(),
        ));
        if let Err(e) = exchange.seed_tickers(&http_client).await {
            error!(error = %e, "failed to seed huobi tickers");
        }
        huobi_accounts = concrete;
        exchanges.push(exchange);
    }

    TradeLayer {
        exchanges,
        binance_accounts,
        bittrex_accounts,
        huobi_accounts,
    }
}

fn spawn_trade_supervisors(trade_layer: &TradeLayer) {
    for exchange in &trade_layer.exchanges {
        match exchange.name() {
            "binance" => {
                tokio::spawn(binance::run_ticker_reader(exchange.ticker_store().clone()));
            }
            "bittrex" => {
                tokio::spawn(bittrex::run_ticker_reader(
                    exchange.ticker_store().clone(),
                    sniper_integration::http::HttpClient::new(),
                ));
            }
            "huobi" => {
                tokio::spawn(huobi::run_ticker_reader(
                    exchange.ticker_store().clone(),
                    sniper_integration::http::HttpClient::new(),
                ));
            }
            _ => {}
        }
    }

    for account in &trade_layer.binance_accounts {
        tokio::spawn(binance::run_account_supervisor(account.clone()));
    }
    for account in &trade_layer.bittrex_accounts {
        tokio::spawn(bittrex::run_account_supervisor(account.clone()));
    }
    for account in &trade_layer.huobi_accounts {
        tokio::spawn(huobi::run_account_supervisor(account.clone()));
        tokio::spawn(huobi::run_price_filter_refresh(account.clone()));
    }
}

fn register_trigger_exchanges(
    manager: &mut TriggerManager,
    config: &Config,
    alerts: sniper_integration::AlertSender,
    metadata: Arc<CoinMarketCapClient>,
    caller: Arc<dyn sniper_data::CallDispatcher>,
    router: Arc<dyn sniper_data::CoinRouter>,
) -> (Arc<TelegramBufferPart>, Arc<TelegramBufferPart>) {
    let binance_exchange = Arc::new(TriggerExchange::new(
        "binance",
        alerts.clone(),
        metadata.clone(),
        caller.clone(),
        router.clone(),
        config.debug,
        config.disable_buy,
    ));
    manager.register_exchange(binance_exchange);
    manager.register_part(
        "binance",
        "wallet",
        Arc::new(BinanceWalletPart::new(Duration::from_secs(60), config.price_change_limit_in_percent)),
    );
    manager.register_part(
        "binance",
        "pairs",
        Arc::new(BinancePairPart::new(Duration::from_secs(60), config.price_change_limit_in_percent)),
    );
    manager.register_part(
        "binance",
        "announcements",
        Arc::new(BinanceAnnouncementsPart::new(Duration::from_secs(30), config.price_change_limit_in_percent)),
    );

    let upbit_exchange = Arc::new(TriggerExchange::new(
        "upbit",
        alerts.clone(),
        metadata.clone(),
        caller.clone(),
        router.clone(),
        config.debug,
        config.disable_buy,
    ));
    manager.register_exchange(upbit_exchange);
    manager.register_part(
        "upbit",
        "krw-market",
        Arc::new(UpbitMarketPart::krw(Duration::from_secs(60), config.upbit_krw_price_change_limit)),
    );
    manager.register_part(
        "upbit",
        "btc-market",
        Arc::new(UpbitMarketPart::btc(Duration::from_secs(60), config.upbit_btc_price_change_limit)),
    );

    let bithumb_exchange = Arc::new(TriggerExchange::new(
        "bithumb",
        alerts.clone(),
        metadata.clone(),
        caller.clone(),
        router.clone(),
        config.debug,
        config.disable_buy,
    ));
    manager.register_exchange(bithumb_exchange);
    manager.register_part(
        "bithumb",
        "wallets",
        Arc::new(BithumbWalletsPart::new(Duration::from_secs(60), config.price_change_limit_in_percent)),
    );
    manager.register_part(
        "bithumb",
        "pairs",
        Arc::new(BithumbPairPart::new(Duration::from_secs(60), config.price_change_limit_in_percent)),
    );
    manager.register_part(
        "bithumb",
        "announcements",
        Arc::new(BithumbAnnouncementsPart::new(Duration::from_secs(3), config.price_change_limit_in_percent)),
    );

    let coinbase_exchange = Arc::new(TriggerExchange::new(
        "coinbase",
        alerts.clone(),
        metadata.clone(),
        caller.clone(),
        router.clone(),
        config.debug,
        config.disable_buy,
    ));
    manager.register_exchange(coinbase_exchange);
    manager.register_part(
        "coinbase",
        "announcements",
        Arc::new(CoinbaseAnnouncementsPart::new(Duration::from_secs(0), config.price_change_limit_in_percent)),
    );

    let coinbase_pro_exchange = Arc::new(TriggerExchange::new(
        "coinbase_pro",
        alerts.clone(),
        metadata.clone(),
        caller.clone(),
        router.clone(),
        config.debug,
        config.disable_buy,
    ));
    manager.register_exchange(coinbase_pro_exchange);
    manager.register_part(
        "coinbase_pro",
        "wallets",
        Arc::new(CoinbaseProWalletsPart::new(Duration::from_secs(60), config.price_change_limit_in_percent)),
    );
    manager.register_part(
        "coinbase_pro",
        "announcements",
        Arc::new(CoinbaseProAnnouncementsPart::new(Duration::from_secs(0), config.price_change_limit_in_percent)),
    );
    if let Some(twitter) = &config.twitter {
        let credentials = TwitterCredentials {
            consumer_key: twitter.consumer_key.clone(),
            consumer_secret: twitter.consumer_secret.clone(),
            access_token: twitter.access_token.clone(),
            access_token_secret: twitter.access_token_secret.clone(),
        };
        let follow_user_ids = vec!["720487892670410753".to_string()]; // @CoinbasePro
        let stream = TwitterStreamPart::new(credentials, follow_user_ids, config.price_change_limit_in_percent);
        manager.register_stream("coinbase_pro", "twitter", Arc::new(AsyncMutex::new(stream)));
    }

    // The chat-bot's injected buffers live on their own named trigger
    // exchange, not pooled under upbit's novelty sets: `/delete_coin telegram
    // <symbol>` and `/fake_coin` both resolve the exchange by the name
    // "telegram".
    let telegram_exchange = Arc::new(TriggerExchange::new("telegram", alerts, metadata, caller, router, config.debug, config.disable_buy));
    manager.register_exchange(telegram_exchange);

    let telegram_krw = Arc::new(TelegramBufferPart::new(
        CoinSource::TgChnlUpbitKrw,
        Duration::from_secs(5),
        HashSet::from([TriggerAction::Buy]),
        config.upbit_krw_price_change_limit,
    ));
    let telegram_btc = Arc::new(TelegramBufferPart::new(
        CoinSource::TgChnlUpbitBtc,
        Duration::from_secs(5),
        HashSet::from([TriggerAction::Buy]),
        config.upbit_btc_price_change_limit,
    ));
    manager.register_part("telegram", "telegram-krw", telegram_krw.clone());
    manager.register_part("telegram", "telegram-btc", telegram_btc.clone());

    (telegram_krw, telegram_btc)
}
