use crate::exchange::TriggerExchange;
use crate::part::{run_check_loop, TriggerPart, TriggerPartStream};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

/// One poller part registered under its owning exchange.
pub struct RegisteredPart {
    pub label: String,
    pub part: Arc<dyn TriggerPart>,
}

/// One stream part registered under its owning exchange. Streams are
/// supervised by the manager (reconnect-on-end), per §4.7's "supervision is
/// the caller's responsibility".
pub struct RegisteredStream {
    pub label: String,
    pub stream: Arc<AsyncMutex<dyn TriggerPartStream>>,
}

/// Owns every [`TriggerExchange`] plus the parts registered under it, and
/// schedules their check loops. Construction order mirrors the control flow
/// in the top-level spec: build every exchange and its parts first, then call
/// [`TriggerManager::init`] once all are registered.
pub struct TriggerManager {
    exchanges: HashMap<String, Arc<TriggerExchange>>,
    parts: HashMap<String, Vec<RegisteredPart>>,
    streams: HashMap<String, Vec<RegisteredStream>>,
}

impl TriggerManager {
    pub fn new() -> Self {
        Self {
            exchanges: HashMap::new(),
            parts: HashMap::new(),
            streams: HashMap::new(),
        }
    }

    pub fn register_exchange(&mut self, exchange: Arc<TriggerExchange>) {
        self.parts.entry(exchange.name.clone()).or_default();
        self.streams.entry(exchange.name.clone()).or_default();
        self.exchanges.insert(exchange.name.clone(), exchange);
    }

    pub fn register_part(&mut self, exchange_name: &str, label: impl Into<String>, part: Arc<dyn TriggerPart>) {
        self.parts
            .entry(exchange_name.to_string())
            .or_default()
            .push(RegisteredPart {
                label: label.into(),
                part,
            });
    }

    pub fn register_stream(
        &mut self,
        exchange_name: &str,
        label: impl Into<String>,
        stream: Arc<AsyncMutex<dyn TriggerPartStream>>,
    ) {
        self.streams
            .entry(exchange_name.to_string())
            .or_default()
            .push(RegisteredStream {
                label: label.into(),
                stream,
            });
    }

    pub fn exchange(&self, name: &str) -> Option<Arc<TriggerExchange>> {
        self.exchanges.get(name).cloned()
    }

    /// Every registered exchange, for reporting (the memory watchdog's
    /// per-exchange known/call coin counts).
    pub fn exchanges(&self) -> impl Iterator<Item = &Arc<TriggerExchange>> {
        self.exchanges.values()
    }

    /// Count of running part check-loops + stream tasks, one "open task" per
    /// registered part/stream (each is spawned 1:1 in `init`).
    pub fn open_task_count(&self) -> usize {
        let part_tasks: usize = self.parts.values().map(|v| v.len()).sum();
        let stream_tasks: usize = self.streams.values().map(|v| v.len()).sum();
        part_tasks + stream_tasks
    }

    /// `/delete_coin <exchangeName> <symbol>` admin op.
    pub fn drop_coin(&self, exchange_name: &str, code: &str) -> bool {
        match self.exchanges.get(exchange_name) {
            Some(exchange) => {
                exchange.drop_coin(code);
                true
            }
            None => false,
        }
    }

    /// Seed every part's novelty set once, then schedule the long-lived check
    /// loops / stream consumers. Consumes `self` into an `Arc` so spawned
    /// tasks can keep the manager alive for the process lifetime.
    pub async fn init(self: Arc<Self>) {
        for (exchange_name, parts) in &self.parts {
            let exchange = match self.exchanges.get(exchange_name) {
                Some(e) => e.clone(),
                None => continue,
            };
            for registered in parts {
                match registered.part.get().await {
                    Ok(coins) => {
                        exchange.seed(registered.part.trigger_actions(), &coins);
                        info!(exchange = %exchange_name, part = %registered.label, count = coins.len(), "seeded novelty set");
                    }
                    Err(e) => {
                        warn!(exchange = %exchange_name, part = %registered.label, error = %e, "dropping part: failed to seed at startup");
                        continue;
                    }
                }
            }
        }

        for (exchange_name, parts) in self.parts.clone_keys() {
            let exchange = self.exchanges.get(&exchange_name).unwrap().clone();
            for registered in parts {
                let exchange = exchange.clone();
                let label = registered.label.clone();
                let part = registered.part.clone();
                tokio::spawn(async move {
                    run_check_loop(part.as_ref(), &label, |coins| {
                        let exchange = exchange.clone();
                        let actions = part.trigger_actions().clone();
                        let limit = part.price_change_limit();
                        tokio::spawn(async move {
                            exchange.process_coins(&actions, limit, coins).await;
                        });
                    })
                    .await;
                });
            }
        }

        for (exchange_name, streams) in self.streams.clone_keys() {
            let exchange = self.exchanges.get(&exchange_name).unwrap().clone();
            for registered in streams {
                let exchange = exchange.clone();
                let label = registered.label.clone();
                let stream = registered.stream.clone();
                tokio::spawn(async move {
                    loop {
                        let next = {
                            let mut guard = stream.lock().await;
                            guard.next().await
                        };
                        match next {
                            Some(coins) => {
                                let (actions, limit) = {
                                    let guard = stream.lock().await;
                                    (guard.trigger_actions().clone(), guard.price_change_limit())
                                };
                                exchange.process_coins(&actions, limit, coins).await;
                            }
                            None => {
                                error!(exchange = %exchange_name, part = %label, "stream ended");
                                break;
                            }
                        }
                    }
                });
            }
        }
    }
}

impl Default for TriggerManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal helper: clone the exchange→parts (or exchange→streams) map so the
/// scheduling loops below don't hold a borrow of `self` across `.await`.
trait CloneKeys<V: Clone> {
    fn clone_keys(&self) -> Vec<(String, Vec<V>)>;
}

impl<V: Clone> CloneKeys<V> for HashMap<String, Vec<V>> {
    fn clone_keys(&self) -> Vec<(String, Vec<V>)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl Clone for RegisteredPart {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            part: self.part.clone(),
        }
    }
}

impl Clone for RegisteredStream {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            stream: self.stream.clone(),
        }
    }
}
