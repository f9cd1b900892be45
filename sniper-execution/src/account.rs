use crate::balance::BalanceStore;
use crate::error::ExecutionError;
use crate::order_calc::calc_buy_order;
use crate::ticker_store::TickerStore;
use async_trait::async_trait;
use sniper_instrument::{Credential, PriceFilter};
use sniper_integration::{norm, AlertSender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// An open order's identity, carrying the pair only for venues that require
/// it on cancel (Bittrex, Huobi — not Binance's listen-key–scoped cancel).
#[derive(Debug, Clone)]
pub struct OpenOrder {
    pub order_id: String,
    pub pair: Option<String>,
}

/// An authenticated session against one trade exchange. Implementations own
/// the exchange-specific wire formats for balance/order parsing and order
/// placement/cancellation; this trait owns the shared buy/cancel algorithm
/// and balance bookkeeping.
#[async_trait]
pub trait Account: Send + Sync {
    fn credential(&self) -> &Credential;
    fn balances(&self) -> &BalanceStore;
    fn label(&self) -> String {
        format!("{}:{}", self.credential().exchange_name, self.credential().owner)
    }

    /// Init order: client -> seed balance via REST -> pre-WS prep (listen
    /// key, etc) -> open WS account channel -> spawn supervisor. Concrete
    /// exchanges implement each stage; this method sequences them.
    async fn init(&self) -> Result<(), ExecutionError>;

    async fn create_buy_order(
        &self,
        pair: &str,
        quantity: rust_decimal::Decimal,
        price: rust_decimal::Decimal,
    ) -> Result<String, ExecutionError>;

    async fn cancel_order(&self, order: &OpenOrder) -> Result<(), ExecutionError>;

    async fn get_open_orders_id(&self) -> Result<Vec<OpenOrder>, ExecutionError>;

    /// The vendor's published price/amount precision for the pair, when it
    /// has one (Huobi's `/v1/common/symbols`). `None` keeps the default
    /// 6dp price / whole-unit quantity used by Binance/Bittrex.
    fn price_filter(&self, _pair: &str) -> Option<PriceFilter> {
        None
    }

    /// `buy(triggerExchange, pair, quoteAsset)`: the six-step algorithm.
    /// Submits the order and, on success, schedules the delayed cancel; both
    /// outcomes are logged locally and to the chat alert queue.
    async fn buy(
        self: Arc<Self>,
        ticker_store: Arc<TickerStore>,
        pair: String,
        quote_asset: String,
        buy_amount_pct: u32,
        markup_pct: u32,
        cancel_delay: Duration,
        alerts: AlertSender,
    ) {
        let label = self.label();
        let free = match self.balances().get(&quote_asset) {
            Some(b) => b.free,
            None => {
                warn!(account = %label, asset = %quote_asset, "no balance known for quote asset");
                return;
            }
        };
        let ticker = match ticker_store.get(&pair) {
            Some(t) => t,
            None => {
                warn!(account = %label, pair = %pair, "pair not found in ticker store");
                return;
            }
        };

        let filter = self.price_filter(&pair);
        let order = match calc_buy_order(free, buy_amount_pct, ticker.price, markup_pct, filter) {
            Some(o) => o,
            None => {
                warn!(account = %label, pair = %pair, "computed buy quantity is zero, skipping");
                return;
            }
        };

        match self.create_buy_order(&pair, order.quantity, order.purchase_price).await {
            Ok(order_id) => {
                let line = format!(
                    "[{}] bought {} {} @ {} (order {})",
                    label,
                    norm(order.quantity),
                    pair,
                    norm(order.purchase_price),
                    order_id
                );
                info!(account = %label, pair = %pair, order_id = %order_id, "buy order placed");
                alerts.send(line);

                let this = self.clone();
                let pair_for_cancel = pair.clone();
                let alerts_for_cancel = alerts.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(cancel_delay).await;
                    let open_order = OpenOrder {
                        order_id: order_id.clone(),
                        pair: Some(pair_for_cancel.clone()),
                    };
                    match this.cancel_order(&open_order).await {
                        Ok(()) => {
                            let line = format!("[{}] cancelled order {}", this.label(), order_id);
                            info!(account = %this.label(), order_id = %order_id, "order cancelled");
                            alerts_for_cancel.send(line);
                        }
                        Err(e) => {
                            let line = format!(
                                "[{}] failed to cancel order {}: {e}",
                                this.label(),
                                order_id
                            );
                            error!(account = %this.label(), order_id = %order_id, error = %e, "cancel failed");
                            alerts_for_cancel.send(line);
                        }
                    }
                });
            }
            Err(e) => {
                let line = format!("[{}] buy failed for {}: {e}", label, pair);
                error!(account = %label, pair = %pair, error = %e, "buy order failed");
                alerts.send(line);
            }
        }
    }
}
