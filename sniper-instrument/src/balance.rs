use derive_more::Constructor;
use rust_decimal::Decimal;

/// A single asset's balance on one account. `total` is derived, never stored,
/// so an update can never leave `free`/`locked`/`total` inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Constructor)]
pub struct Balance {
    pub free: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_is_free_plus_locked() {
        let b = Balance::new(dec!(1.5), dec!(0.5));
        assert_eq!(b.total(), dec!(2.0));
    }
}
