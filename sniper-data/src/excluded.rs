use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Static coin-exclusion set. Union with [`EXCLUDED_REGEX`] forms the full
/// policy; novelty is computed only after exclusion.
pub static EXCLUDED_COINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "BTC", "ETH", "KRW", "PAX", "DAI", "BCHABC", "BCHSV", "PST", "BTT", "CELR",
    ]
    .into_iter()
    .collect()
});

pub static EXCLUDED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w?USD\w?").expect("static regex is valid"));

pub fn is_excluded(code: &str) -> bool {
    EXCLUDED_COINS.contains(code) || EXCLUDED_REGEX.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_set_is_excluded() {
        assert!(is_excluded("BTC"));
        assert!(is_excluded("CELR"));
    }

    #[test]
    fn usd_regex_is_excluded() {
        assert!(is_excluded("USDT"));
        assert!(is_excluded("TUSD"));
        assert!(is_excluded("BUSD"));
    }

    #[test]
    fn ordinary_coin_is_not_excluded() {
        assert!(!is_excluded("MANA"));
    }
}
