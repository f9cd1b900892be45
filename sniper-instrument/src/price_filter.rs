use rust_decimal::Decimal;

/// Per-pair rounding rule. Only Huobi requires this in practice (Binance and
/// Bittrex quantize to a fixed 6 decimal places), but the type is shared so
/// any future venue can plug into the same `Account::buy` quantization step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFilter {
    pub price_precision: u32,
    pub amount_precision: u32,
}

impl PriceFilter {
    pub fn new(price_precision: u32, amount_precision: u32) -> Self {
        Self {
            price_precision,
            amount_precision,
        }
    }

    pub fn quantize_price(&self, price: Decimal) -> Decimal {
        price.round_dp(self.price_precision)
    }

    pub fn quantize_amount(&self, amount: Decimal) -> Decimal {
        amount.round_dp(self.amount_precision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_precision_yields_integer() {
        let filter = PriceFilter::new(0, 0);
        assert_eq!(filter.quantize_amount(dec!(12.7)), dec!(13));
    }

    #[test]
    fn nonzero_precision_rounds() {
        let filter = PriceFilter::new(4, 2);
        assert_eq!(filter.quantize_price(dec!(1.234567)), dec!(1.2346));
    }
}
