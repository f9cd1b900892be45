use sniper_integration::http::{HttpClient, OutputFormat};
use sniper_integration::AlertReceiver;
use std::collections::HashMap;
use tracing::{error, warn};

/// Single-consumer task draining the alert queue into Telegram's
/// `sendMessage`, preserving enqueue order FIFO per spec §5's
/// multi-producer/single-consumer guarantee.
pub async fn run_telegram_log(bot_token: String, log_channel_id: i64, mut receiver: AlertReceiver) {
    let client = HttpClient::new();
    let url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");

    while let Some(line) = receiver.recv().await {
        let mut form = HashMap::new();
        form.insert("chat_id".to_string(), log_channel_id.to_string());
        form.insert("text".to_string(), line.clone());

        if let Err(e) = client.post(&url, OutputFormat::Json, None, Some(form), None).await {
            warn!(error = %e, line = %line, "failed to deliver chat log line");
        }
    }
    error!("alert queue closed, chat log consumer exiting");
}
