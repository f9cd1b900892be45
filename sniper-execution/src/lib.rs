//! The Trade Execution Layer: `Account`/`TradeExchange` connectors and the
//! fan-out `TradeManager` that implements `sniper_data::CoinRouter`.

pub mod account;
pub mod balance;
pub mod error;
pub mod exchange;
pub mod manager;
pub mod order_calc;
pub mod signing;
pub mod ticker_store;
pub mod trade_exchange;

pub use account::{Account, OpenOrder};
pub use balance::BalanceStore;
pub use error::ExecutionError;
pub use manager::TradeManager;
pub use order_calc::{calc_buy_order, BuyOrder};
pub use ticker_store::TickerStore;
pub use trade_exchange::TradeExchange;
