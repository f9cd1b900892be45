use crate::config::Config;
use regex::Regex;
use rust_decimal::Decimal;
use sniper_data::exchanges::telegram::TelegramBufferPart;
use sniper_data::TriggerManager;
use sniper_execution::TradeExchange;
use sniper_instrument::{CoinSource, Symbol};
use sniper_integration::AlertSender;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Shared state every chat-bot command operates against. Holds no tokio
/// runtime references; everything here is cheap to clone (`Arc` handles).
pub struct AppContext {
    pub config: Config,
    pub trigger_manager: Arc<TriggerManager>,
    pub trade_exchanges: Vec<Arc<dyn TradeExchange>>,
    pub telegram_krw: Arc<TelegramBufferPart>,
    pub telegram_btc: Arc<TelegramBufferPart>,
    pub alerts: AlertSender,
}

fn listing_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"상장|오픈|이벤트").expect("static regex is valid"))
}

fn paren_symbol_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([A-Za-z0-9]+)\)").expect("static regex is valid"))
}

fn btc_pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z0-9]{2,10})/BTC\b|\bBTC-([A-Za-z0-9]{2,10})\b").expect("static regex is valid"))
}

fn krw_pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Za-z0-9]{2,10})/KRW\b|\bKRW-([A-Za-z0-9]{2,10})\b").expect("static regex is valid"))
}

/// Extract symbols per spec §4.11's three regex families, apply the
/// black/white-list, and return the (KRW-buffer, BTC-buffer) symbol sets.
pub fn extract_channel_post_symbols(ctx: &AppContext, text: &str) -> (Vec<String>, Vec<String>) {
    let mut krw = Vec::new();
    let mut btc = Vec::new();

    if listing_keyword_regex().is_match(text) {
        if let Some(caps) = paren_symbol_regex().captures(text) {
            krw.push(caps[1].to_uppercase());
        }
    }
    for caps in btc_pair_regex().captures_iter(text) {
        let symbol = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_uppercase());
        if let Some(symbol) = symbol {
            btc.push(symbol);
        }
    }
    for caps in krw_pair_regex().captures_iter(text) {
        let symbol = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_uppercase());
        if let Some(symbol) = symbol {
            krw.push(symbol);
        }
    }

    let keep = |s: &String| -> bool {
        if !ctx.config.symbols_white_list.is_empty() && !ctx.config.symbols_white_list.contains(s) {
            return false;
        }
        !ctx.config.symbols_black_list.contains(s)
    };
    krw.retain(keep);
    btc.retain(keep);
    (krw, btc)
}

/// Channel-post handler: feeds extracted symbols into the telegram trigger's
/// KRW/BTC buffers, which the registered `TriggerPart`s poll and return-and-clear.
pub fn handle_channel_post(ctx: &AppContext, chat_id: i64, text: &str) {
    if chat_id != ctx.config.listen_channel_id {
        return;
    }
    let (krw, btc) = extract_channel_post_symbols(ctx, text);
    for code in krw {
        ctx.telegram_krw.push(Symbol::new(code, CoinSource::TgChnlUpbitKrw));
    }
    for code in btc {
        ctx.telegram_btc.push(Symbol::new(code, CoinSource::TgChnlUpbitBtc));
    }
}

/// `/fake_coin <symbol>`: injects directly into the KRW buffer, exercising
/// the full pipeline exactly like a real channel post would.
pub fn handle_fake_coin(ctx: &AppContext, symbol: &str) -> String {
    ctx.telegram_krw.push(Symbol::new(symbol, CoinSource::Telegram));
    format!("injected {}", symbol.to_uppercase())
}

/// `/delete_coin <exchangeName> <symbol>`.
pub fn handle_delete_coin(ctx: &AppContext, exchange_name: &str, symbol: &str) -> String {
    if ctx.trigger_manager.drop_coin(exchange_name, &symbol.to_uppercase()) {
        format!("dropped {} from {}", symbol.to_uppercase(), exchange_name)
    } else {
        format!("no such trigger exchange: {exchange_name}")
    }
}

/// `/cancel`: for every account, fetch open orders and cancel each
/// concurrently; report `canceled N/M` per account.
pub async fn handle_cancel(ctx: &AppContext) -> String {
    let mut lines = Vec::new();
    for exchange in &ctx.trade_exchanges {
        for account in exchange.accounts() {
            let open_orders = match account.get_open_orders_id().await {
                Ok(orders) => orders,
                Err(e) => {
                    warn!(account = %account.label(), error = %e, "failed to list open orders");
                    lines.push(format!("{}: failed to list open orders: {e}", account.label()));
                    continue;
                }
            };
            let total = open_orders.len();
            let mut cancelled = 0;
            let results = futures_util::future::join_all(
                open_orders.iter().map(|order| account.cancel_order(order)),
            )
            .await;
            for result in results {
                if result.is_ok() {
                    cancelled += 1;
                }
            }
            info!(account = %account.label(), cancelled, total, "cancel sweep finished");
            lines.push(format!("{}: canceled {}/{}", account.label(), cancelled, total));
        }
    }
    lines.join("\n")
}

/// `/balances`: groups all accounts by owner; for each asset whose
/// BTC-equivalent value exceeds `BALANCE_SHOW_LIMIT_BTC`, print
/// `asset = free[/total]`. Price lookup: USD-denominated assets form
/// `(BTC, asset)` and invert; others form `(asset, BTC)` directly. A missing
/// ticker fails open — the raw balance is still printed.
pub async fn handle_balances(ctx: &AppContext) -> String {
    let mut by_owner: HashMap<String, Vec<String>> = HashMap::new();

    for exchange in &ctx.trade_exchanges {
        for account in exchange.accounts() {
            let owner = account.credential().owner.to_string();
            for (asset, balance) in account.balances().snapshot() {
                let btc_value = estimate_btc_value(exchange.as_ref(), &asset, balance.free);
                let shows = match btc_value {
                    Some(v) => v > ctx.config.balance_show_limit_btc,
                    None => true,
                };
                if !shows {
                    continue;
                }
                let line = if balance.locked.is_zero() {
                    format!("{} {} = {}", exchange.name(), asset, balance.free)
                } else {
                    format!("{} {} = {}/{}", exchange.name(), asset, balance.free, balance.total())
                };
                by_owner.entry(owner.clone()).or_default().push(line);
            }
        }
    }

    if by_owner.is_empty() {
        return "no balances".to_string();
    }

    let mut out = String::new();
    for (owner, lines) in by_owner {
        out.push_str(&format!("== {owner} ==\n"));
        out.push_str(&lines.join("\n"));
        out.push('\n');
    }
    out
}

fn estimate_btc_value(exchange: &dyn TradeExchange, asset: &str, free: Decimal) -> Option<Decimal> {
    if asset == "BTC" {
        return Some(free);
    }
    let pair = if asset.contains("USD") {
        exchange.make_pair("BTC", asset)
    } else {
        exchange.make_pair(asset, "BTC")
    };
    let ticker = exchange.ticker_store().get(&pair)?;
    if asset.contains("USD") {
        if ticker.price.is_zero() {
            None
        } else {
            Some(free / ticker.price)
        }
    } else {
        Some(free * ticker.price)
    }
}

pub const HELP_TEXT: &str = "\
/balances - show balances above the configured BTC floor
/cancel - cancel all open orders across every account
/delete_coin <exchange> <symbol> - reintroduce a symbol's novelty
/fake_coin <symbol> - inject a symbol into the telegram pipeline
/help - show this message";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn korean_listing_post_extracts_parenthesised_symbol_to_krw() {
        let ctx_config = Config {
            debug: false,
            twitter: None,
            bot_token: String::new(),
            authorized_users_telegram_ids: vec![],
            log_channel_id: 0,
            balance_show_limit_btc: Decimal::new(5, 3),
            price_change_limit_in_percent: Decimal::from(25),
            twilio_from_number: String::new(),
            twilio_account_sid: String::new(),
            twilio_auth_key: String::new(),
            limit_order_markup: 15,
            disable_buy: false,
            order_cancel_delay: std::time::Duration::from_secs(15),
            listen_channel_id: 0,
            symbols_black_list: vec![],
            symbols_white_list: vec![],
            upbit_krw_price_change_limit: Decimal::from(25),
            upbit_btc_price_change_limit: Decimal::from(25),
            mem_check_interval: None,
        };
        let (tx, _rx) = sniper_integration::alert_queue();
        let ctx = AppContext {
            config: ctx_config,
            trigger_manager: Arc::new(TriggerManager::new()),
            trade_exchanges: vec![],
            telegram_krw: Arc::new(TelegramBufferPart::new(
                CoinSource::TgChnlUpbitKrw,
                std::time::Duration::from_secs(1),
                std::collections::HashSet::from([sniper_data::TriggerAction::Buy]),
                Decimal::from(25),
            )),
            telegram_btc: Arc::new(TelegramBufferPart::new(
                CoinSource::TgChnlUpbitBtc,
                std::time::Duration::from_secs(1),
                std::collections::HashSet::from([sniper_data::TriggerAction::Buy]),
                Decimal::from(25),
            )),
            alerts: tx,
        };

        let text = "[이벤트] 디센트럴랜드(MANA) 원화마켓 오픈 이벤트 - MANA TOP 트레이딩 이벤트";
        let (krw, btc) = extract_channel_post_symbols(&ctx, text);
        assert_eq!(krw, vec!["MANA".to_string()]);
        assert!(btc.is_empty());
    }

    #[test]
    fn btc_pair_post_with_whitelist_filters_to_whitelisted_symbols() {
        let mut ctx_config = Config {
            debug: false,
            twitter: None,
            bot_token: String::new(),
            authorized_users_telegram_ids: vec![],
            log_channel_id: 0,
            balance_show_limit_btc: Decimal::new(5, 3),
            price_change_limit_in_percent: Decimal::from(25),
            twilio_from_number: String::new(),
            twilio_account_sid: String::new(),
            twilio_auth_key: String::new(),
            limit_order_markup: 15,
            disable_buy: false,
            order_cancel_delay: std::time::Duration::from_secs(15),
            listen_channel_id: 0,
            symbols_black_list: vec![],
            symbols_white_list: vec!["LAMB".to_string(), "CPT".to_string(), "ATOM".to_string(), "COSM".to_string()],
            upbit_krw_price_change_limit: Decimal::from(25),
            upbit_btc_price_change_limit: Decimal::from(25),
            mem_check_interval: None,
        };
        ctx_config.listen_channel_id = 0;
        let (tx, _rx) = sniper_integration::alert_queue();
        let ctx = AppContext {
            config: ctx_config,
            trigger_manager: Arc::new(TriggerManager::new()),
            trade_exchanges: vec![],
            telegram_krw: Arc::new(TelegramBufferPart::new(
                CoinSource::TgChnlUpbitKrw,
                std::time::Duration::from_secs(1),
                std::collections::HashSet::from([sniper_data::TriggerAction::Buy]),
                Decimal::from(25),
            )),
            telegram_btc: Arc::new(TelegramBufferPart::new(
                CoinSource::TgChnlUpbitBtc,
                std::time::Duration::from_secs(1),
                std::collections::HashSet::from([sniper_data::TriggerAction::Buy]),
                Decimal::from(25),
            )),
            alerts: tx,
        };

        let text = "by @CMfree Upbit Endpoint #1 (…): LAMB/BTC CPT/BTC";
        let (krw, btc) = extract_channel_post_symbols(&ctx, text);
        assert!(krw.is_empty());
        let mut btc_sorted = btc.clone();
        btc_sorted.sort();
        assert_eq!(btc_sorted, vec!["CPT".to_string(), "LAMB".to_string()]);
    }
}
