//! Domain model shared across the listing sniper workspace: symbols and their
//! provenance, credentials, balances, tickers, price filters, and the
//! per-exchange pair-naming trait.

pub mod balance;
pub mod credential;
pub mod pair;
pub mod price_filter;
pub mod symbol;
pub mod ticker;

pub use balance::Balance;
pub use credential::{check_unique, Credential, NonUniqueCredentials};
pub use pair::{ConcatPair, DashedQuoteFirstPair, MakePair};
pub use price_filter::PriceFilter;
pub use symbol::{CoinSource, Symbol};
pub use ticker::Ticker;
