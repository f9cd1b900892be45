use rust_decimal::Decimal;
use sniper_instrument::Symbol;

/// The fan-out coordinator's inbound face, as seen from the trigger side.
/// Implemented by `sniper-execution`'s `TradeManager` and injected into every
/// [`crate::exchange::TriggerExchange`] so this crate never depends on the
/// execution layer directly.
pub trait CoinRouter: Send + Sync {
    fn process_coin(&self, trigger_name: &str, coin: &Symbol, price_change_limit: Decimal);
}

/// A router that does nothing; useful for trigger exchanges whose parts are
/// call-only, or in tests.
pub struct NullRouter;

impl CoinRouter for NullRouter {
    fn process_coin(&self, _trigger_name: &str, _coin: &Symbol, _price_change_limit: Decimal) {}
}
