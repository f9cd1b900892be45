use chrono::Utc;
use sniper_data::TriggerManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Optional supervised task reporting process RSS and a handful of internal
/// counters on a fixed interval. Rust has no analogue of Python's
/// `pympler`/`tracemalloc` object-graph introspection, so this is a
/// deliberately smaller stand-in: RSS from `/proc/self/status` plus
/// known-coin set sizes, written as text under `_mem_reports/`.
pub async fn run_memory_watchdog(interval: Duration, trigger_manager: Arc<TriggerManager>) {
    loop {
        tokio::time::sleep(interval).await;
        if let Err(e) = write_report(&trigger_manager).await {
            error!(error = %e, "failed to write memory report");
        }
    }
}

fn read_rss_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            return rest.trim().split_whitespace().next()?.parse().ok();
        }
    }
    None
}

async fn write_report(trigger_manager: &Arc<TriggerManager>) -> anyhow::Result<()> {
    let dir = PathBuf::from("_mem_reports");
    tokio::fs::create_dir_all(&dir).await?;

    let rss_kb = read_rss_kb();
    let timestamp = Utc::now().to_rfc3339();
    let open_task_count = trigger_manager.open_task_count();

    let mut report = format!(
        "timestamp: {timestamp}\nrss_kb: {}\nopen_tasks: {open_task_count}\n",
        rss_kb.map(|v| v.to_string()).unwrap_or_else(|| "unavailable".to_string())
    );
    for exchange in trigger_manager.exchanges() {
        report.push_str(&format!(
            "known_coins[{}]: {}\ncall_coins[{}]: {}\n",
            exchange.name,
            exchange.known_coin_count(),
            exchange.name,
            exchange.call_coin_count(),
        ));
    }

    let path = dir.join(format!("{}.txt", timestamp.replace(':', "-")));
    tokio::fs::write(&path, report).await?;
    info!(path = %path.display(), rss_kb = ?rss_kb, open_task_count, "wrote memory report");
    Ok(())
}
