use rust_decimal::Decimal;
use sniper_instrument::PriceFilter;

/// Step 1-4 of the buy algorithm: given the account's free balance of the
/// quote asset, the configured buy percentage, the current ticker price, and
/// the order markup, compute the quantity and the markup-adjusted purchase
/// price. `price_filter` is `None` for the fixed-precision venues
/// (Binance/Bittrex, whole-unit quantity, 6dp price) and `Some(filter)` for
/// Huobi, whose `/v1/common/symbols` publishes a price/amount precision per
/// pair that both values must be quantized to before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuyOrder {
    pub quantity: Decimal,
    pub purchase_price: Decimal,
}

pub fn calc_buy_order(
    free_balance: Decimal,
    buy_amount_pct: u32,
    ticker_price: Decimal,
    markup_pct: u32,
    price_filter: Option<PriceFilter>,
) -> Option<BuyOrder> {
    if ticker_price <= Decimal::ZERO {
        return None;
    }
    let quote_amount = free_balance * Decimal::from(buy_amount_pct) / Decimal::from(100);
    let dirty_qty = quote_amount / ticker_price;
    let quantity = match price_filter {
        Some(filter) => filter.quantize_amount(dirty_qty),
        None => dirty_qty.floor(),
    };
    if quantity <= Decimal::ZERO {
        return None;
    }

    let purchase_price = ticker_price * (Decimal::from(100 + markup_pct)) / Decimal::from(100);
    let purchase_price = match price_filter {
        Some(filter) => filter.quantize_price(purchase_price),
        None => purchase_price.round_dp(6),
    };

    Some(BuyOrder {
        quantity,
        purchase_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn computes_quantity_and_markup_price() {
        let order = calc_buy_order(dec!(1.0), 50, dec!(0.001), 15, None).unwrap();
        // quote_amount = 0.5, dirty_qty = 500, quantity = 500
        assert_eq!(order.quantity, dec!(500));
        assert_eq!(order.purchase_price, dec!(0.001150)); // +15% markup, 6dp
    }

    #[test]
    fn zero_quantity_is_none() {
        assert!(calc_buy_order(dec!(0.0000001), 50, dec!(1), 15, None).is_none());
    }

    #[test]
    fn huobi_precision_quantizes_to_configured_decimals() {
        let filter = PriceFilter::new(2, 4);
        let order = calc_buy_order(dec!(10), 100, dec!(2.3333333), 15, Some(filter)).unwrap();
        assert_eq!(order.purchase_price, dec!(2.68)); // 2.3333333 * 1.15 = 2.683..., rounds to 2 dp
    }

    #[test]
    fn fractional_amount_precision_is_not_truncated_to_zero() {
        // free=1, pct=50%, price=10 -> dirty_qty=0.05, which under the
        // whole-unit default would truncate to a quantity of 0 and be
        // rejected; a published amount_precision must keep the fraction.
        let filter = PriceFilter::new(2, 4);
        let order = calc_buy_order(dec!(1), 50, dec!(10), 0, Some(filter)).unwrap();
        assert_eq!(order.quantity, dec!(0.05));
    }

    #[test]
    fn amount_precision_quantizes_like_the_vendor_filter() {
        let filter = PriceFilter::new(2, 2);
        // dirty_qty = 0.0555..., quantized to 2dp the same way
        // `PriceFilter::quantize_amount` rounds any other amount.
        let order = calc_buy_order(dec!(1), 10, dec!(1.8), 0, Some(filter)).unwrap();
        assert_eq!(order.quantity, dec!(0.06));
    }
}
