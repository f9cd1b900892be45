use crate::error::CheckError;
use crate::part::{TriggerAction, TriggerActions, TriggerPart};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sniper_instrument::{CoinSource, Symbol};
use std::collections::HashSet;
use std::time::Duration;

/// A part fed entirely by external pushes (the chat-bot's channel-post
/// handler, or `/fake_coin`). `get()` swaps the buffer with an empty one and
/// returns what was there — "return-and-clear" — so the check loop's fixed
/// `delay` is effectively the buffer's poll cadence.
pub struct TelegramBufferPart {
    source: CoinSource,
    buffer: Mutex<HashSet<Symbol>>,
    delay: Duration,
    actions: TriggerActions,
    price_change_limit: Decimal,
}

impl TelegramBufferPart {
    pub fn new(
        source: CoinSource,
        delay: Duration,
        actions: TriggerActions,
        price_change_limit: Decimal,
    ) -> Self {
        Self {
            source,
            buffer: Mutex::new(HashSet::new()),
            delay,
            actions,
            price_change_limit,
        }
    }

    /// Enqueue a symbol extracted by the channel-post handler, or injected by
    /// `/fake_coin`.
    pub fn push(&self, symbol: Symbol) {
        self.buffer.lock().insert(symbol);
    }
}

#[async_trait]
impl TriggerPart for TelegramBufferPart {
    fn source(&self) -> CoinSource {
        self.source
    }
    fn trigger_actions(&self) -> &TriggerActions {
        &self.actions
    }
    fn delay(&self) -> Duration {
        self.delay
    }
    fn price_change_limit(&self) -> Decimal {
        self.price_change_limit
    }

    async fn get(&self) -> Result<HashSet<Symbol>, CheckError> {
        let mut guard = self.buffer.lock();
        Ok(std::mem::take(&mut *guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_swaps_and_clears_buffer() {
        let part = TelegramBufferPart::new(
            CoinSource::TgChnlUpbitKrw,
            Duration::from_secs(1),
            HashSet::from([TriggerAction::Buy]),
            Decimal::from(25),
        );
        part.push(Symbol::new("MANA", CoinSource::TgChnlUpbitKrw));
        let first = part.get().await.unwrap();
        assert_eq!(first.len(), 1);
        let second = part.get().await.unwrap();
        assert!(second.is_empty());
    }
}
