use crate::coin_metadata::CoinMetadata;
use crate::excluded::is_excluded;
use crate::part::{TriggerAction, TriggerActions};
use crate::router::CoinRouter;
use rust_decimal::Decimal;
use sniper_instrument::Symbol;
use sniper_integration::AlertSender;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Dispatches the "call everyone" fan-out when a `{call}`-tagged part yields a
/// novelty. Implemented by `sniper::alert::Caller` and injected the same way
/// [`CoinRouter`] is, so this crate stays free of telephony concerns.
pub trait CallDispatcher: Send + Sync {
    fn call_all(&self);
}

pub struct NullCallDispatcher;

impl CallDispatcher for NullCallDispatcher {
    fn call_all(&self) {}
}

/// One trigger exchange: owns its parts' shared novelty state
/// (`known_coins`/`call_coins`), and fans a fresh novelty out to alerts, the
/// telephony caller, and the trade layer.
pub struct TriggerExchange {
    pub name: String,
    known_coins: parking_lot::Mutex<HashSet<String>>,
    call_coins: parking_lot::Mutex<HashSet<String>>,
    alerts: AlertSender,
    metadata: Arc<dyn CoinMetadata>,
    caller: Arc<dyn CallDispatcher>,
    router: Arc<dyn CoinRouter>,
    debug: bool,
    disable_buy: bool,
}

impl TriggerExchange {
    pub fn new(
        name: impl Into<String>,
        alerts: AlertSender,
        metadata: Arc<dyn CoinMetadata>,
        caller: Arc<dyn CallDispatcher>,
        router: Arc<dyn CoinRouter>,
        debug: bool,
        disable_buy: bool,
    ) -> Self {
        Self {
            name: name.into(),
            known_coins: parking_lot::Mutex::new(HashSet::new()),
            call_coins: parking_lot::Mutex::new(HashSet::new()),
            alerts,
            metadata,
            caller,
            router,
            debug,
            disable_buy,
        }
    }

    /// Seed a novelty set at startup without emitting alerts, matching the
    /// "call every non-stream part's get() once to seed knownCoins/callCoins"
    /// initialization rule.
    pub fn seed(&self, actions: &TriggerActions, coins: &HashSet<Symbol>) {
        let target = self.target_set(actions);
        let mut target = target.lock();
        for coin in coins {
            target.insert(coin.code.to_string());
        }
    }

    /// Size of the buy-side novelty set, for the memory watchdog's report.
    pub fn known_coin_count(&self) -> usize {
        self.known_coins.lock().len()
    }

    /// Size of the call-only novelty set, for the memory watchdog's report.
    pub fn call_coin_count(&self) -> usize {
        self.call_coins.lock().len()
    }

    fn target_set<'a>(
        &'a self,
        actions: &TriggerActions,
    ) -> &'a parking_lot::Mutex<HashSet<String>> {
        if actions.len() == 1 && actions.contains(&TriggerAction::Call) {
            &self.call_coins
        } else {
            &self.known_coins
        }
    }

    /// The novelty diff + dispatch rule described for every part's observed
    /// coin set.
    pub async fn process_coins(
        &self,
        actions: &TriggerActions,
        price_change_limit: Decimal,
        coins: HashSet<Symbol>,
    ) {
        let new_coins: Vec<Symbol> = {
            let target = self.target_set(actions);
            let mut target = target.lock();
            let fresh: Vec<Symbol> = coins
                .into_iter()
                .filter(|c| {
                    !target.contains(c.code.as_str()) && !is_excluded(c.code.as_str())
                })
                .collect();
            for c in &fresh {
                target.insert(c.code.to_string());
            }
            fresh
        };

        if new_coins.is_empty() {
            return;
        }

        for coin in &new_coins {
            let info = self.metadata.lookup(coin.code.as_str()).await;
            let line = match info {
                Some(info) => format!(
                    "[{}] new coin: {} ({}) {}",
                    self.name, info.name, coin.code, info.url
                ),
                None => format!("[{}] new coin: {}", self.name, coin.code),
            };
            self.alerts.send(line);
            info!(exchange = %self.name, code = %coin.code, "novel coin detected");
        }

        if !self.debug && actions.contains(&TriggerAction::Call) {
            self.caller.call_all();
        }

        if !self.disable_buy && actions.contains(&TriggerAction::Buy) {
            for coin in &new_coins {
                self.router
                    .process_coin(&self.name, coin, price_change_limit);
            }
        }
    }

    /// `/delete_coin` admin op: drops a symbol from `known_coins`, reintroducing
    /// its novelty on the next observation.
    pub fn drop_coin(&self, code: &str) {
        self.known_coins.lock().remove(code);
        self.call_coins.lock().remove(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sniper_instrument::CoinSource;
    use sniper_integration::alert_queue;
    use std::collections::HashSet as Set;

    struct NoopMetadata;
    #[async_trait::async_trait]
    impl CoinMetadata for NoopMetadata {
        async fn lookup(&self, _code: &str) -> Option<crate::coin_metadata::CoinInfo> {
            None
        }
    }

    struct CountingRouter(std::sync::atomic::AtomicUsize);
    impl CoinRouter for CountingRouter {
        fn process_coin(&self, _trigger_name: &str, _coin: &Symbol, _limit: Decimal) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    fn buy_actions() -> TriggerActions {
        Set::from([TriggerAction::Buy])
    }

    #[tokio::test]
    async fn excludes_and_dedupes_novelty() {
        let (tx, _rx) = alert_queue();
        let router = Arc::new(CountingRouter(std::sync::atomic::AtomicUsize::new(0)));
        let exch = TriggerExchange::new(
            "binance",
            tx,
            Arc::new(NoopMetadata),
            Arc::new(NullCallDispatcher),
            router.clone(),
            false,
            false,
        );

        let mut coins = Set::new();
        coins.insert(Symbol::new("MANA", CoinSource::ApiWallet));
        coins.insert(Symbol::new("BTC", CoinSource::ApiWallet));
        coins.insert(Symbol::new("USDT", CoinSource::ApiWallet));
        exch.process_coins(&buy_actions(), Decimal::from(25), coins).await;
        assert_eq!(router.0.load(std::sync::atomic::Ordering::SeqCst), 1);

        // second time MANA is no longer novel
        let mut coins2 = Set::new();
        coins2.insert(Symbol::new("MANA", CoinSource::ApiWallet));
        exch.process_coins(&buy_actions(), Decimal::from(25), coins2).await;
        assert_eq!(router.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn debug_mode_skips_buy_routing() {
        let (tx, _rx) = alert_queue();
        let router = Arc::new(CountingRouter(std::sync::atomic::AtomicUsize::new(0)));
        let exch = TriggerExchange::new(
            "binance",
            tx,
            Arc::new(NoopMetadata),
            Arc::new(NullCallDispatcher),
            router.clone(),
            false,
            true, // disable_buy
        );
        let mut coins = Set::new();
        coins.insert(Symbol::new("MANA", CoinSource::ApiWallet));
        exch.process_coins(&buy_actions(), Decimal::from(25), coins).await;
        assert_eq!(router.0.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_coin_reintroduces_novelty() {
        let (tx, _rx) = alert_queue();
        let exch = TriggerExchange::new(
            "binance",
            tx,
            Arc::new(NoopMetadata),
            Arc::new(NullCallDispatcher),
            Arc::new(crate::router::NullRouter),
            false,
            false,
        );
        exch.seed(&buy_actions(), &{
            let mut s = Set::new();
            s.insert(Symbol::new("MANA", CoinSource::ApiWallet));
            s
        });
        assert!(exch.known_coins.lock().contains("MANA"));
        exch.drop_coin("MANA");
        assert!(!exch.known_coins.lock().contains("MANA"));
    }
}
