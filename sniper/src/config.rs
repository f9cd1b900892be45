use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

/// Every runtime-tunable knob from spec §6, loaded once at startup from the
/// process environment (after `dotenvy` has loaded an optional `.env` file).
/// Parsing is lenient per-field (`ok().and_then(..)`) but defaults fill in
/// anything absent or malformed, except for the Twitter OAuth quadruple,
/// which is fatal if `TWITTER_ENABLED=true` and any of the four is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub debug: bool,
    pub twitter: Option<TwitterConfig>,
    pub bot_token: String,
    pub authorized_users_telegram_ids: Vec<i64>,
    pub log_channel_id: i64,
    pub balance_show_limit_btc: Decimal,
    pub price_change_limit_in_percent: Decimal,
    pub twilio_from_number: String,
    pub twilio_account_sid: String,
    pub twilio_auth_key: String,
    pub limit_order_markup: u32,
    pub disable_buy: bool,
    pub order_cancel_delay: Duration,
    pub listen_channel_id: i64,
    pub symbols_black_list: Vec<String>,
    pub symbols_white_list: Vec<String>,
    pub upbit_krw_price_change_limit: Decimal,
    pub upbit_btc_price_change_limit: Decimal,
    pub mem_check_interval: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct TwitterConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    env_str(key).and_then(|v| v.parse().ok())
}

fn env_bool(key: &str) -> bool {
    env_str(key).map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes")).unwrap_or(false)
}

fn env_csv<T: FromStr>(key: &str) -> Vec<T> {
    env_str(key)
        .map(|v| v.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default()
}

impl Config {
    /// Fail-fast per spec §7 item 6: a `TWITTER_ENABLED=true` with any OAuth
    /// value missing aborts startup with a descriptive error, same as a
    /// non-unique-credentials error.
    pub fn load() -> anyhow::Result<Self> {
        let twitter = if env_bool("TWITTER_ENABLED") {
            Some(TwitterConfig {
                consumer_key: env_str("TWITTER_CONSUMER_KEY")
                    .ok_or_else(|| anyhow::anyhow!("TWITTER_ENABLED but TWITTER_CONSUMER_KEY missing"))?,
                consumer_secret: env_str("TWITTER_CONSUMER_SECRET")
                    .ok_or_else(|| anyhow::anyhow!("TWITTER_ENABLED but TWITTER_CONSUMER_SECRET missing"))?,
                access_token: env_str("TWITTER_ACCESS_TOKEN")
                    .ok_or_else(|| anyhow::anyhow!("TWITTER_ENABLED but TWITTER_ACCESS_TOKEN missing"))?,
                access_token_secret: env_str("TWITTER_ACCESS_TOKEN_SECRET")
                    .ok_or_else(|| anyhow::anyhow!("TWITTER_ENABLED but TWITTER_ACCESS_TOKEN_SECRET missing"))?,
            })
        } else {
            None
        };

        Ok(Self {
            debug: env_bool("DEBUG"),
            twitter,
            bot_token: env_str("BOT_TOKEN").ok_or_else(|| anyhow::anyhow!("BOT_TOKEN is required"))?,
            authorized_users_telegram_ids: env_csv("AUTHORIZED_USERS_TELEGRAM_IDS"),
            log_channel_id: env_parsed("LOG_CHANNEL_ID").unwrap_or(0),
            balance_show_limit_btc: env_parsed("BALANCE_SHOW_LIMIT_BTC").unwrap_or(Decimal::new(5, 3)),
            price_change_limit_in_percent: env_parsed("PRICE_CHANGE_LIMIT_IN_PERCENT").unwrap_or(Decimal::from(25)),
            twilio_from_number: env_str("TWILIO_FROM_NUMBER").unwrap_or_default(),
            twilio_account_sid: env_str("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_key: env_str("TWILIO_AUTH_KEY").unwrap_or_default(),
            limit_order_markup: env_parsed("LIMIT_ORDER_MARKUP").unwrap_or(15),
            disable_buy: env_bool("DISABLE_BUY"),
            order_cancel_delay: Duration::from_secs(env_parsed("ORDER_CANCEL_DELAY").unwrap_or(15)),
            listen_channel_id: env_parsed("LISTEN_CHANNEL_ID").unwrap_or(0),
            symbols_black_list: env_csv("SYMBOLS_BLACK_LIST"),
            symbols_white_list: env_csv("SYMBOLS_WHITE_LIST"),
            upbit_krw_price_change_limit: env_parsed("UPBIT_KRW_PRICE_CHANGE_LIMIT").unwrap_or(Decimal::from(25)),
            upbit_btc_price_change_limit: env_parsed("UPBIT_BTC_PRICE_CHANGE_LIMIT").unwrap_or(Decimal::from(25)),
            mem_check_interval: env_parsed::<u64>("MEM_CHECK_INTERVAL").map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_csv_parses_comma_separated_ints() {
        std::env::set_var("TEST_CSV_IDS", "1, 2,3");
        let ids: Vec<i64> = env_csv("TEST_CSV_IDS");
        assert_eq!(ids, vec![1, 2, 3]);
        std::env::remove_var("TEST_CSV_IDS");
    }

    #[test]
    fn env_bool_accepts_common_truthy_spellings() {
        std::env::set_var("TEST_BOOL_FLAG", "true");
        assert!(env_bool("TEST_BOOL_FLAG"));
        std::env::set_var("TEST_BOOL_FLAG", "0");
        assert!(!env_bool("TEST_BOOL_FLAG"));
        std::env::remove_var("TEST_BOOL_FLAG");
    }
}
