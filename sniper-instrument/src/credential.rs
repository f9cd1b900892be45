use smol_str::SmolStr;
use std::collections::HashSet;
use thiserror::Error;

/// An authenticated API key pair for one account on one trade exchange.
/// Globally unique by `(exchange_name, api_key, api_secret)`.
#[derive(Debug, Clone)]
pub struct Credential {
    pub owner: SmolStr,
    pub exchange_name: SmolStr,
    pub api_key: String,
    pub api_secret: String,
}

impl Credential {
    pub fn new(
        owner: impl Into<SmolStr>,
        exchange_name: impl Into<SmolStr>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            exchange_name: exchange_name.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    fn identity(&self) -> (SmolStr, String, String) {
        (
            self.exchange_name.clone(),
            self.api_key.clone(),
            self.api_secret.clone(),
        )
    }
}

#[derive(Debug, Error)]
#[error("non-unique credentials: {0} entries collapse to {1} distinct (exchange, key, secret)")]
pub struct NonUniqueCredentials(usize, usize);

/// Fatal-at-startup configuration check: every credential must be unique by
/// `(exchange, api_key, api_secret)`. Treated strictly — any collision aborts
/// the whole set rather than silently dropping the duplicate.
pub fn check_unique(creds: Vec<Credential>) -> Result<Vec<Credential>, NonUniqueCredentials> {
    let distinct: HashSet<_> = creds.iter().map(Credential::identity).collect();
    if distinct.len() == creds.len() {
        Ok(creds)
    } else {
        Err(NonUniqueCredentials(creds.len(), distinct.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_unique_set() {
        let creds = vec![
            Credential::new("alice", "binance", "k1", "s1"),
            Credential::new("bob", "binance", "k2", "s2"),
        ];
        assert_eq!(check_unique(creds.clone()).unwrap().len(), creds.len());
    }

    #[test]
    fn rejects_duplicate_identity() {
        let creds = vec![
            Credential::new("alice", "binance", "k1", "s1"),
            Credential::new("alice-again", "binance", "k1", "s1"),
        ];
        assert!(check_unique(creds).is_err());
    }

    #[test]
    fn same_key_different_exchange_is_unique() {
        let creds = vec![
            Credential::new("alice", "binance", "k1", "s1"),
            Credential::new("alice", "huobi", "k1", "s1"),
        ];
        assert!(check_unique(creds).is_ok());
    }
}
