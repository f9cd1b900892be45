use crate::error::{CheckError, PartError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sniper_instrument::{CoinSource, Symbol};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, warn};

/// What a novel symbol should trigger once it clears the novelty filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerAction {
    Buy,
    Call,
}

pub type TriggerActions = HashSet<TriggerAction>;

/// One observation channel inside a [`crate::exchange::TriggerExchange`],
/// polled on a fixed cadence. Implementations perform the exchange-specific
/// scrape/API call in [`TriggerPart::get`]; the check loop in
/// [`TriggerPart::run_check_loop`] owns retry/backoff policy uniformly.
#[async_trait]
pub trait TriggerPart: Send + Sync {
    fn source(&self) -> CoinSource;
    fn trigger_actions(&self) -> &TriggerActions;
    fn delay(&self) -> Duration;
    fn price_change_limit(&self) -> Decimal;

    /// Exchange-specific scrape/API call returning the currently-observed
    /// symbol set. Parts raise [`PartError`] on vendor shape mismatches;
    /// 429s are surfaced as [`CheckError::RateLimited`] by the HTTP layer
    /// underneath, not by this method.
    async fn get(&self) -> Result<HashSet<Symbol>, CheckError>;
}

/// A long-lived producer yielding symbol sets as they arrive (used for
/// externally-pushed buffers like the Telegram channel-post ingestor).
/// Streams do not auto-reconnect inside the part; the caller supervises.
#[async_trait]
pub trait TriggerPartStream: Send + Sync {
    fn source(&self) -> CoinSource;
    fn trigger_actions(&self) -> &TriggerActions;
    fn price_change_limit(&self) -> Decimal;

    /// Swap the part's internal buffer with an empty one and return what was
    /// there, mirroring the Python implementation's "return-and-clear".
    async fn next(&mut self) -> Option<HashSet<Symbol>>;
}

/// Drives a poller's check loop forever: `sleep(delay)`, `get()`, dispatch the
/// result (or log and continue) into `on_coins`. `on_coins` is the trigger
/// exchange's `processCoins`, passed as a closure so this module never needs
/// to know about [`crate::exchange::TriggerExchange`] directly.
pub async fn run_check_loop<P, F>(part: &P, part_label: &str, mut on_coins: F)
where
    P: TriggerPart + ?Sized,
    F: FnMut(HashSet<Symbol>),
{
    loop {
        tokio::time::sleep(part.delay()).await;
        match part.get().await {
            Ok(coins) => on_coins(coins),
            Err(CheckError::RateLimited { retry_after_secs }) => {
                let sleep_for = if retry_after_secs > 0 {
                    retry_after_secs + 60
                } else {
                    600
                };
                warn!(part = part_label, retry_after_secs, sleep_for, "rate limited");
                tokio::time::sleep(Duration::from_secs(sleep_for)).await;
            }
            Err(CheckError::Part(PartError { url, response })) => {
                error!(part = part_label, url, response, "part error");
            }
            Err(CheckError::Transport(e)) => {
                error!(part = part_label, error = %e, "unknown error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct FlakyOncePart {
        calls: AtomicU64,
    }

    #[async_trait]
    impl TriggerPart for FlakyOncePart {
        fn source(&self) -> CoinSource {
            CoinSource::ApiWallet
        }
        fn trigger_actions(&self) -> &TriggerActions {
            static ACTIONS: std::sync::OnceLock<TriggerActions> = std::sync::OnceLock::new();
            ACTIONS.get_or_init(|| HashSet::from([TriggerAction::Buy]))
        }
        fn delay(&self) -> Duration {
            Duration::from_millis(1)
        }
        fn price_change_limit(&self) -> Decimal {
            Decimal::from(25)
        }
        async fn get(&self) -> Result<HashSet<Symbol>, CheckError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(CheckError::RateLimited {
                    retry_after_secs: 0,
                })
            } else {
                let mut set = HashSet::new();
                set.insert(Symbol::new("MANA", CoinSource::ApiWallet));
                Ok(set)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_without_retry_after_falls_back_to_600s() {
        let part = FlakyOncePart {
            calls: AtomicU64::new(0),
        };
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let handle = tokio::spawn(async move {
            run_check_loop(&part, "test", move |coins| {
                seen_clone.lock().push(coins);
            })
            .await;
        });

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::time::advance(Duration::from_secs(600)).await;
        tokio::time::advance(Duration::from_millis(5)).await;
        tokio::task::yield_now().await;

        handle.abort();
        assert_eq!(seen.lock().len(), 1);
    }
}
