pub mod binance;
pub mod bittrex;
pub mod huobi;
