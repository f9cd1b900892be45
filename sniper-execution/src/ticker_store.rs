use parking_lot::Mutex;
use sniper_instrument::Ticker;
use std::collections::HashMap;

/// `pair -> Ticker`, single-writer (the ticker-WS reader) per trade exchange.
/// Readers may observe stale values; there is no additional locking beyond
/// this single-writer discipline.
#[derive(Default)]
pub struct TickerStore {
    inner: Mutex<HashMap<String, Ticker>>,
}

impl TickerStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, pair: impl Into<String>, ticker: Ticker) {
        self.inner.lock().insert(pair.into(), ticker);
    }

    pub fn get(&self, pair: &str) -> Option<Ticker> {
        self.inner.lock().get(pair).copied()
    }

    pub fn replace_all(&self, tickers: HashMap<String, Ticker>) {
        *self.inner.lock() = tickers;
    }
}
