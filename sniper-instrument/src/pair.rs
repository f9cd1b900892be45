/// Per-exchange symbol-pair naming. Each trade exchange implementation
/// provides its own vendor-native pair string from a `(base, quote)` pair.
pub trait MakePair {
    fn make_pair(base: &str, quote: &str) -> String;
}

/// `<base><quote>`, e.g. `ETHBTC`. Shared by Binance and Huobi.
pub struct ConcatPair;

impl MakePair for ConcatPair {
    fn make_pair(base: &str, quote: &str) -> String {
        format!("{}{}", base.to_uppercase(), quote.to_uppercase())
    }
}

/// `<quote>-<base>`, e.g. `BTC-ETH`. Bittrex's pair convention.
pub struct DashedQuoteFirstPair;

impl MakePair for DashedQuoteFirstPair {
    fn make_pair(base: &str, quote: &str) -> String {
        format!("{}-{}", quote.to_uppercase(), base.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binance_and_huobi_concatenate() {
        assert_eq!(ConcatPair::make_pair("ETH", "BTC"), "ETHBTC");
    }

    #[test]
    fn bittrex_puts_quote_first() {
        assert_eq!(DashedQuoteFirstPair::make_pair("ETH", "BTC"), "BTC-ETH");
    }
}
