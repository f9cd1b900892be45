use crate::account::Account;
use crate::ticker_store::TickerStore;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sniper_integration::AlertSender;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Shared backing store for a `TradeExchange`'s account list: a plain
/// `Vec` would fix membership at construction, so failed-`init()` accounts
/// could never be dropped per spec's "account is dropped from the
/// exchange's active list" rule.
pub type AccountList = parking_lot::RwLock<Vec<Arc<dyn Account>>>;

pub fn new_account_list(accounts: Vec<Arc<dyn Account>>) -> AccountList {
    parking_lot::RwLock::new(accounts)
}

pub fn account_snapshot(accounts: &AccountList) -> Vec<Arc<dyn Account>> {
    accounts.read().clone()
}

pub fn remove_account_by_label(accounts: &AccountList, label: &str) {
    accounts.write().retain(|a| a.label() != label);
}

/// A venue where orders are actually placed. Holds its accounts, ticker
/// store, and the quote assets it will buy with.
#[async_trait]
pub trait TradeExchange: Send + Sync {
    fn name(&self) -> &str;
    fn buy_symbols(&self) -> &[String];
    fn make_pair(&self, base: &str, quote: &str) -> String;
    fn ticker_store(&self) -> &Arc<TickerStore>;
    fn accounts(&self) -> Vec<Arc<dyn Account>>;
    /// Drops the account with this label from the active list, per spec §7
    /// item 5 — called when `account.init()` fails at startup.
    fn remove_account(&self, label: &str);
    fn buy_amount_pct(&self, quote_asset: &str) -> u32;
    fn markup_pct(&self) -> u32;
    fn cancel_delay(&self) -> Duration;
    fn alerts(&self) -> &AlertSender;

    /// For every quote asset this exchange buys with, dispatch `buy_pair`
    /// concurrently.
    async fn buy(&self, base_symbol: &str, price_change_limit: Decimal) {
        let mut handles = Vec::new();
        for quote in self.buy_symbols() {
            let pair = self.make_pair(base_symbol, quote);
            handles.push(self.buy_pair(pair, quote.clone(), price_change_limit));
        }
        futures_util::future::join_all(handles).await;
    }

    /// Ticker-gate then fan out one buy task per account, without awaiting
    /// their completion beyond scheduling.
    async fn buy_pair(&self, pair: String, quote_asset: String, price_change_limit: Decimal) {
        let ticker = match self.ticker_store().get(&pair) {
            Some(t) => t,
            None => {
                warn!(exchange = %self.name(), pair = %pair, "pair not found, skipping buy");
                return;
            }
        };
        if ticker.price_change_pct > price_change_limit {
            warn!(
                exchange = %self.name(),
                pair = %pair,
                price_change_pct = %ticker.price_change_pct,
                limit = %price_change_limit,
                "price change exceeds limit, skipping buy"
            );
            return;
        }

        let buy_amount_pct = self.buy_amount_pct(&quote_asset);
        let markup_pct = self.markup_pct();
        let cancel_delay = self.cancel_delay();
        let alerts = self.alerts().clone();
        let ticker_store = self.ticker_store().clone();

        for account in self.accounts() {
            let account = account.clone();
            let pair = pair.clone();
            let quote_asset = quote_asset.clone();
            let ticker_store = ticker_store.clone();
            let alerts = alerts.clone();
            tokio::spawn(async move {
                account
                    .buy(
                        ticker_store,
                        pair,
                        quote_asset,
                        buy_amount_pct,
                        markup_pct,
                        cancel_delay,
                        alerts,
                    )
                    .await;
            });
        }
    }
}
