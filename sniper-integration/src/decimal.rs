use rust_decimal::Decimal;

/// Render a [`Decimal`] the way alert messages and log lines expect: rounded to
/// 8 decimal places, trailing zeros and a bare trailing point stripped, and a
/// lone `"0"` for anything that rounds away to nothing.
pub fn norm(value: Decimal) -> String {
    let rounded = value.round_dp(8);
    let mut s = rounded.normalize().to_string();
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn norm_examples() {
        assert_eq!(norm(dec!(5.00)), "5");
        assert_eq!(norm(dec!(3)), "3");
        assert_eq!(norm(dec!(0.00000024)), "0.00000024");
        assert_eq!(norm(dec!(0.00000000024)), "0");
        assert_eq!(norm(dec!(1.2345678987654)), "1.2345679");
        assert_eq!(norm(dec!(1.23450000000)), "1.2345");
        assert_eq!(norm(dec!(0.000000001)), "0");
    }

    #[test]
    fn norm_of_product() {
        let a = dec!(1.2345678987654);
        assert_eq!(norm(a * a), "1.5241579");
    }
}
