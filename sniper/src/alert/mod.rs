pub mod bot;
pub mod caller;
pub mod commands;
pub mod telegram_log;
