use sniper_data::excluded::EXCLUDED_COINS;
use sniper_execution::TradeExchange;
use sniper_integration::AlertSender;
use std::sync::Arc;
use std::time::Duration;

/// On successful boot, emit one alert-log message summarizing enabled trade
/// accounts per exchange, the exclusion set, the order markup, and the
/// cancel delay — a Rust rendition of `checker.py`'s `send_start_msg`.
pub fn send_start_message(
    alerts: &AlertSender,
    trade_exchanges: &[Arc<dyn TradeExchange>],
    markup_pct: u32,
    cancel_delay: Duration,
) {
    let mut lines = vec!["listing sniper started".to_string()];

    for exchange in trade_exchanges {
        let owners: Vec<String> = exchange
            .accounts()
            .iter()
            .map(|a| a.credential().owner.to_string())
            .collect();
        lines.push(format!("{}: accounts = [{}]", exchange.name(), owners.join(", ")));
    }

    lines.push(format!(
        "excluded coins: {}",
        EXCLUDED_COINS.iter().copied().collect::<Vec<_>>().join(", ")
    ));
    lines.push(format!("order markup: {markup_pct}%"));
    lines.push(format!("cancel delay: {}s", cancel_delay.as_secs()));

    alerts.send(lines.join("\n"));
}
