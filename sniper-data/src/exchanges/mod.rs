pub mod binance;
pub mod bithumb;
pub mod coinbase;
pub mod coinbase_pro;
pub mod telegram;
pub mod twitter;
pub mod upbit;
