use smol_str::SmolStr;
use std::hash::{Hash, Hasher};

/// Where a [`Symbol`] observation came from. Purely informational for most
/// call sites, but it decides which novelty set (`known` vs `call`) a
/// [`crate::Symbol`] is diffed against upstream in `sniper-data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoinSource {
    ApiWallet,
    ApiPair,
    ApiUnofficial,
    Site,
    Js,
    Twitter,
    Telegram,
    TgChnlUpbitKrw,
    TgChnlUpbitBtc,
}

/// A short upper-case ticker code observed from some provenance, optionally
/// carrying a source URL for alert messages. Two symbols are equal, and hash
/// equal, iff their `code` matches — the `source`/`url` are metadata only.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub code: SmolStr,
    pub source: CoinSource,
    pub url: Option<String>,
}

impl Symbol {
    pub fn new(code: impl Into<String>, source: CoinSource) -> Self {
        Self {
            code: SmolStr::new(code.into().to_uppercase()),
            source,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_code_only() {
        let a = Symbol::new("mana", CoinSource::Telegram);
        let b = Symbol::new("MANA", CoinSource::ApiWallet).with_url("https://example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn code_is_upper_cased() {
        let s = Symbol::new("mana", CoinSource::Site);
        assert_eq!(s.code, "MANA");
    }
}
