use rust_decimal::Decimal;

/// Latest observed price plus 24h change percentage for one exchange-native
/// pair string. Seeded by a REST snapshot, then mutated in place by a single
/// WS-reader writer; readers may observe stale values but never a torn write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticker {
    pub price_change_pct: Decimal,
    pub price: Decimal,
}

impl Ticker {
    pub fn new(price_change_pct: Decimal, price: Decimal) -> Self {
        Self {
            price_change_pct,
            price,
        }
    }
}
