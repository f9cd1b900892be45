use parking_lot::Mutex;
use sniper_instrument::Balance;
use std::collections::HashMap;
use tracing::info;

/// Single-writer balance map for one account. The WS reader is the sole
/// writer; REST snapshots only ever seed it.
#[derive(Default)]
pub struct BalanceStore {
    inner: Mutex<HashMap<String, Balance>>,
}

impl BalanceStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Seed from a REST snapshot. Does not log transitions — there is no
    /// prior value to contrast against at boot.
    pub fn seed(&self, asset: impl Into<String>, balance: Balance) {
        self.inner.lock().insert(asset.into(), balance);
    }

    /// Write only if different from the current value; logs the old → new
    /// transition either way the value changed. Matches the invariant that,
    /// after processing, the stored balance equals the update payload
    /// regardless of what was there before.
    pub fn update(&self, asset: impl Into<String>, account_label: &str, new: Balance) {
        let asset = asset.into();
        let mut inner = self.inner.lock();
        let old = inner.get(&asset).copied();
        if old != Some(new) {
            info!(
                account = account_label,
                asset = %asset,
                old_free = ?old.map(|b| b.free),
                old_locked = ?old.map(|b| b.locked),
                new_free = %new.free,
                new_locked = %new.locked,
                "balance updated"
            );
        }
        inner.insert(asset, new);
    }

    pub fn get(&self, asset: &str) -> Option<Balance> {
        self.inner.lock().get(asset).copied()
    }

    pub fn snapshot(&self) -> HashMap<String, Balance> {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn update_overwrites_regardless_of_prior_value() {
        let store = BalanceStore::new();
        store.seed("BTC", Balance::new(dec!(1), dec!(0)));
        store.update("BTC", "acct", Balance::new(dec!(2), dec!(0.5)));
        assert_eq!(store.get("BTC"), Some(Balance::new(dec!(2), dec!(0.5))));
    }

    #[test]
    fn update_on_missing_asset_inserts() {
        let store = BalanceStore::new();
        store.update("ETH", "acct", Balance::new(dec!(3), dec!(0)));
        assert_eq!(store.get("ETH"), Some(Balance::new(dec!(3), dec!(0))));
    }
}
