use tokio::sync::mpsc;

/// Single-consumer FIFO queue feeding the Telegram alert log. Multiple producer
/// tasks (trigger exchanges, the trade layer, the chat-bot surface) enqueue
/// alert lines; one consumer task drains them in order into the chat API.
#[derive(Debug, Clone)]
pub struct AlertSender {
    tx: mpsc::UnboundedSender<String>,
}

pub struct AlertReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

pub fn alert_queue() -> (AlertSender, AlertReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (AlertSender { tx }, AlertReceiver { rx })
}

impl AlertSender {
    /// Enqueue a line. Silently drops if the consumer has already shut down,
    /// matching the "best-effort close" shutdown policy.
    pub fn send(&self, line: impl Into<String>) {
        let _ = self.tx.send(line.into());
    }
}

impl AlertReceiver {
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preserves_fifo_order() {
        let (tx, mut rx) = alert_queue();
        tx.send("first");
        tx.send("second");
        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        assert_eq!(rx.recv().await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn recv_none_after_senders_dropped() {
        let (tx, mut rx) = alert_queue();
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }
}
