use crate::trade_exchange::TradeExchange;
use rust_decimal::Decimal;
use sniper_data::CoinRouter;
use sniper_instrument::Symbol;
use std::sync::Arc;
use tracing::info;

/// The fan-out coordinator: owns every [`TradeExchange`] and routes a novel
/// coin to every exchange whose name differs from the one that discovered
/// it.
pub struct TradeManager {
    exchanges: Vec<Arc<dyn TradeExchange>>,
    debug: bool,
}

impl TradeManager {
    pub fn new(exchanges: Vec<Arc<dyn TradeExchange>>, debug: bool) -> Self {
        Self { exchanges, debug }
    }
}

impl CoinRouter for TradeManager {
    fn process_coin(&self, trigger_name: &str, coin: &Symbol, price_change_limit: Decimal) {
        let targets: Vec<Arc<dyn TradeExchange>> = self
            .exchanges
            .iter()
            .filter(|e| e.name() != trigger_name)
            .cloned()
            .collect();

        if targets.is_empty() {
            info!(trigger = trigger_name, coin = %coin.code, "nothing to buy");
            return;
        }

        if self.debug {
            info!(trigger = trigger_name, coin = %coin.code, "debug mode: skipping buy fan-out");
            return;
        }

        let code = coin.code.to_string();
        for exchange in targets {
            let code = code.clone();
            tokio::spawn(async move {
                exchange.buy(&code, price_change_limit).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::ticker_store::TickerStore;
    use async_trait::async_trait;
    use sniper_instrument::CoinSource;
    use sniper_integration::alert_queue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubExchange {
        name: String,
        calls: Arc<AtomicUsize>,
        tickers: Arc<TickerStore>,
        alerts: sniper_integration::AlertSender,
    }

    #[async_trait]
    impl TradeExchange for StubExchange {
        fn name(&self) -> &str {
            &self.name
        }
        fn buy_symbols(&self) -> &[String] {
            &[]
        }
        fn make_pair(&self, base: &str, quote: &str) -> String {
            format!("{base}{quote}")
        }
        fn ticker_store(&self) -> &Arc<TickerStore> {
            &self.tickers
        }
        fn accounts(&self) -> Vec<Arc<dyn Account>> {
            vec![]
        }
        fn remove_account(&self, _label: &str) {}
        fn buy_amount_pct(&self, _quote_asset: &str) -> u32 {
            50
        }
        fn markup_pct(&self) -> u32 {
            15
        }
        fn cancel_delay(&self) -> Duration {
            Duration::from_secs(15)
        }
        fn alerts(&self) -> &sniper_integration::AlertSender {
            &self.alerts
        }

        async fn buy(&self, _base_symbol: &str, _price_change_limit: Decimal) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stub(name: &str, calls: Arc<AtomicUsize>) -> Arc<dyn TradeExchange> {
        let (tx, _rx) = alert_queue();
        Arc::new(StubExchange {
            name: name.to_string(),
            calls,
            tickers: Arc::new(TickerStore::new()),
            alerts: tx,
        })
    }

    #[tokio::test]
    async fn never_dispatches_to_the_triggering_exchange() {
        let binance_calls = Arc::new(AtomicUsize::new(0));
        let bittrex_calls = Arc::new(AtomicUsize::new(0));
        let huobi_calls = Arc::new(AtomicUsize::new(0));

        let manager = TradeManager::new(
            vec![
                stub("binance", binance_calls.clone()),
                stub("bittrex", bittrex_calls.clone()),
                stub("huobi", huobi_calls.clone()),
            ],
            false,
        );

        let coin = Symbol::new("MANA", CoinSource::ApiWallet);
        manager.process_coin("binance", &coin, Decimal::from(25));

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(binance_calls.load(Ordering::SeqCst), 0);
        assert_eq!(bittrex_calls.load(Ordering::SeqCst), 1);
        assert_eq!(huobi_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn debug_mode_never_dispatches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let manager = TradeManager::new(
            vec![stub("binance", Arc::new(AtomicUsize::new(0))), stub("bittrex", calls.clone())],
            true,
        );
        let coin = Symbol::new("MANA", CoinSource::ApiWallet);
        manager.process_coin("binance", &coin, Decimal::from(25));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
