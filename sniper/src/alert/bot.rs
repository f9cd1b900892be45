use crate::alert::commands::{self, AppContext, HELP_TEXT};
use serde_json::Value;
use sniper_integration::http::{HttpClient, OutputFormat};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Long-polls Telegram's `getUpdates`, authorizes by numeric user id against
/// `AUTHORIZED_USERS_TELEGRAM_IDS`, and dispatches `/`-prefixed commands plus
/// the configured listen-channel's post stream. Reconnects on any transport
/// error rather than treating it as fatal, per spec §7's supervised-loop
/// policy.
pub async fn run_bot(ctx: Arc<AppContext>) {
    let client = HttpClient::new();
    let base = format!("https://api.telegram.org/bot{}", ctx.config.bot_token);
    let mut offset: i64 = 0;

    loop {
        let url = format!("{base}/getUpdates?offset={offset}&timeout=30");
        let resp = match client.get(&url, OutputFormat::Json, None).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };
        let Some(updates) = resp.as_json().and_then(|j| j.get("result")).and_then(Value::as_array) else {
            warn!("malformed getUpdates response");
            continue;
        };

        for update in updates {
            if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                offset = offset.max(update_id + 1);
            }
            if let Some(message) = update.get("message") {
                handle_message(&ctx, &client, &base, message).await;
            } else if let Some(post) = update.get("channel_post") {
                handle_channel_post(&ctx, post);
            }
        }
    }
}

async fn handle_message(ctx: &Arc<AppContext>, client: &HttpClient, base: &str, message: &Value) {
    let Some(chat_id) = message.get("chat").and_then(|c| c.get("id")).and_then(Value::as_i64) else {
        return;
    };
    let Some(user_id) = message.get("from").and_then(|f| f.get("id")).and_then(Value::as_i64) else {
        return;
    };
    let Some(text) = message.get("text").and_then(Value::as_str) else {
        return;
    };

    if !ctx.config.authorized_users_telegram_ids.contains(&user_id) {
        reply(client, base, chat_id, "unauthorized").await;
        return;
    }

    let mut parts = text.split_whitespace();
    let command = parts.next().unwrap_or("");
    let args: Vec<&str> = parts.collect();

    let reply_text = match command {
        "/help" => HELP_TEXT.to_string(),
        "/balances" => commands::handle_balances(ctx).await,
        "/cancel" => commands::handle_cancel(ctx).await,
        "/delete_coin" => match args.as_slice() {
            [exchange, symbol] => commands::handle_delete_coin(ctx, exchange, symbol),
            _ => "usage: /delete_coin <exchangeName> <symbol>".to_string(),
        },
        "/fake_coin" => match args.as_slice() {
            [symbol] => commands::handle_fake_coin(ctx, symbol),
            _ => "usage: /fake_coin <symbol>".to_string(),
        },
        "" => return,
        other => format!("unknown command: {other} (try /help)"),
    };

    reply(client, base, chat_id, &reply_text).await;
}

fn handle_channel_post(ctx: &Arc<AppContext>, post: &Value) {
    let Some(chat_id) = post.get("chat").and_then(|c| c.get("id")).and_then(Value::as_i64) else {
        return;
    };
    let Some(text) = post.get("text").and_then(Value::as_str) else {
        return;
    };
    commands::handle_channel_post(ctx, chat_id, text);
}

async fn reply(client: &HttpClient, base: &str, chat_id: i64, text: &str) {
    let url = format!("{base}/sendMessage");
    let mut form = HashMap::new();
    form.insert("chat_id".to_string(), chat_id.to_string());
    form.insert("text".to_string(), text.to_string());
    if let Err(e) = client.post(&url, OutputFormat::Json, None, Some(form), None).await {
        error!(error = %e, "failed to send chat-bot reply");
    }
}
