//! The Trader event-dispatch loop and position state machine (SPEC_FULL
//! §4.5, §4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::domain::{
    calculate_pnl, Balance, Clock, ExecutionReportFrame, OrderFill, OrderPlaceResult, OrderReport,
    OrderSide, Position, State, Status, SymbolMetadata, TradeTick,
};
use crate::core::ports::OrderSink;

/// A message classified off its `e`/`channel` discriminator, ready for
/// dispatch. Unrecognized frames classify as `Ignore` (§4.5's final row).
enum Parsed {
    Trade(TradeTick),
    Order(OrderReport),
    BalanceDelta(Vec<(String, Balance)>),
    ExchangeInfo(Value),
    AccountStatus(Value),
    TradesRecent(Value),
    Ignore,
}

/// Owns [`State`] and drives it from bus messages. Cloned state access is
/// shared with the Time Watcher via the same `Arc<Mutex<State>>` (§5).
pub struct Trader {
    config: Config,
    clock: Arc<dyn Clock>,
    orders: Arc<dyn OrderSink>,
    state: Arc<Mutex<State>>,
    fatal: AtomicBool,
}

impl Trader {
    #[must_use]
    pub fn new(config: Config, clock: Arc<dyn Clock>, orders: Arc<dyn OrderSink>, state: Arc<Mutex<State>>) -> Self {
        Self { config, clock, orders, state, fatal: AtomicBool::new(false) }
    }

    #[must_use]
    pub fn state(&self) -> Arc<Mutex<State>> {
        self.state.clone()
    }

    /// Set once `exit_with_error` runs. The Supervisor consults this after
    /// its tasks unwind to decide between exit code 0 and 1 (§6a) — `main`
    /// cannot distinguish the self-delivered `SIGTERM` from an operator's at
    /// the signal-handling level, by design, so the distinction is carried
    /// here instead.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.fatal.load(Ordering::SeqCst)
    }

    /// Consumes the bus until cancelled or the bus is closed. Takes `Arc<Self>`
    /// so the same Trader can also be driven, tick by tick, by the Time
    /// Watcher (`time_watcher_tick`) from a second task sharing this state.
    pub async fn run(self: Arc<Self>, mut bus: mpsc::UnboundedReceiver<Value>, cancel: CancellationToken) {
        loop {
            let message = tokio::select! {
                () = cancel.cancelled() => return,
                message = bus.recv() => message,
            };
            let Some(message) = message else { return };
            self.handle_message(&message);
        }
    }

    /// Processes one bus message end to end: event-message side effects,
    /// the INITIAL→READY check, classification and dispatch, then the
    /// per-status follow-up actions (§4.5's loop body). Exposed directly so
    /// tests can drive the Trader without a bus or a live connector.
    pub fn handle_message(&self, message: &Value) {
        self.check_event_messages(message);
        self.check_state();

        match self.parse_message(message) {
            Parsed::Trade(trade) => self.process_trade(&trade),
            Parsed::Order(order) => self.process_order(&order),
            Parsed::BalanceDelta(delta) => {
                let mut state = self.state.lock().unwrap();
                state.balances.apply_delta(delta);
            }
            Parsed::ExchangeInfo(result) => self.parse_exchange_info(&result),
            Parsed::AccountStatus(result) => self.parse_and_update_balances(&result, true),
            Parsed::TradesRecent(result) => self.seed_last_price_from_recent_trades(&result),
            Parsed::Ignore => {}
        }

        let status = self.state.lock().unwrap().status;
        match status {
            Status::InPosition => self.check_position_actions(),
            Status::Ready => self.create_new_position(),
            _ => {}
        }
    }

    /// §4.5: `stream_ready` flips on the user-data connector's synthetic
    /// `connected` frame. Every other `channel` frame is inert here — their
    /// side effects live in `parse_message`'s dispatch, not this check.
    fn check_event_messages(&self, message: &Value) {
        let Some(channel) = message.get("channel").and_then(Value::as_str) else {
            return;
        };
        if channel == "user_stream" && message.get("event").and_then(Value::as_str) == Some("connected") {
            self.state.lock().unwrap().stream_ready = true;
        }
    }

    /// INITIAL → READY once every readiness flag is set and a price has
    /// been observed (§4.6).
    fn check_state(&self) {
        let mut state = self.state.lock().unwrap();
        if state.status == Status::Initial && state.ready_preconditions_met() {
            state.status = Status::Ready;
            info!(channel = "trader", "ready for trading");
        }
    }

    fn parse_message(&self, message: &Value) -> Parsed {
        if let Some(event_type) = message.get("e").and_then(Value::as_str) {
            return match event_type {
                "trade" => serde_json::from_value::<TradeTick>(message.clone())
                    .map(Parsed::Trade)
                    .unwrap_or(Parsed::Ignore),
                "executionReport" => serde_json::from_value::<ExecutionReportFrame>(message.clone())
                    .map(|frame| Parsed::Order(frame.into()))
                    .unwrap_or(Parsed::Ignore),
                "outboundAccountPosition" => message
                    .get("B")
                    .and_then(Value::as_array)
                    .map(|entries| Parsed::BalanceDelta(balance_delta_entries(entries)))
                    .unwrap_or(Parsed::Ignore),
                _ => Parsed::Ignore,
            };
        }

        match message.get("channel").and_then(Value::as_str) {
            Some("private_trades_recent") => message
                .get("result")
                .cloned()
                .map(Parsed::TradesRecent)
                .unwrap_or(Parsed::Ignore),
            Some("private_exchangeinfo") => message
                .get("result")
                .cloned()
                .map(Parsed::ExchangeInfo)
                .unwrap_or(Parsed::Ignore),
            Some("private_account_status") => message
                .get("result")
                .cloned()
                .map(Parsed::AccountStatus)
                .unwrap_or(Parsed::Ignore),
            Some("private_order") => message
                .get("result")
                .and_then(|result| serde_json::from_value::<OrderPlaceResult>(result.clone()).ok())
                .map(|result| Parsed::Order(OrderReport::from_rpc_result(&result)))
                .unwrap_or(Parsed::Ignore),
            _ => Parsed::Ignore,
        }
    }

    fn process_trade(&self, trade: &TradeTick) {
        if let Some(price) = trade.price() {
            self.state.lock().unwrap().last_price = price;
        }
    }

    /// §4.5's `private_trades_recent` row: seeds `last_price` from the most
    /// recent public trade so the bot doesn't have to wait for the first
    /// live tick after connecting.
    fn seed_last_price_from_recent_trades(&self, result: &Value) {
        let Some(first) = result.as_array().and_then(|trades| trades.first()) else {
            return;
        };
        let Some(price) = first.get("price").and_then(Value::as_str).and_then(|p| p.parse::<f64>().ok()) else {
            return;
        };
        if price.is_finite() && price > 0.0 {
            self.state.lock().unwrap().last_price = price;
        }
    }

    /// §4.5: finds the configured symbol's entry, reads its trading rules,
    /// applies §4.6's acceptance gates, and commits `symbols_ready`.
    fn parse_exchange_info(&self, result: &Value) {
        let Some(entry) = result
            .get("symbols")
            .and_then(Value::as_array)
            .and_then(|symbols| symbols.iter().find(|s| s.get("symbol").and_then(Value::as_str) == Some(self.config.symbol.as_str())))
        else {
            return;
        };

        let status = entry.get("status").and_then(Value::as_str).unwrap_or_default();
        let base_asset = entry.get("baseAsset").and_then(Value::as_str).unwrap_or_default().to_string();
        let quote_asset = entry.get("quoteAsset").and_then(Value::as_str).unwrap_or_default().to_string();
        let trading = status == "TRADING";

        let filters = entry.get("filters").and_then(Value::as_array);
        let min_qty = find_filter_field(filters, "LOT_SIZE", "minQty");
        let min_notional = find_filter_field(filters, "NOTIONAL", "minNotional");

        {
            let mut state = self.state.lock().unwrap();
            state.symbol = Some(SymbolMetadata {
                symbol: self.config.symbol.clone(),
                base_asset,
                quote_asset,
                trading,
                min_qty,
                min_notional,
            });
            state.symbols_ready = true;
        }

        if !trading {
            self.exit_with_error(&format!("symbol {} is not in TRADING status", self.config.symbol));
            return;
        }
        match min_qty {
            Some(min_qty) if self.config.position_quantity >= min_qty => {}
            _ => self.exit_with_error("POSITION_QUANTITY is below the exchange's minimum LOT_SIZE"),
        }
    }

    /// §4.5: the full-snapshot form replaces the balance map wholesale.
    /// `from_snapshot` selects that vs. the incremental delta form, which
    /// instead goes through `Parsed::BalanceDelta`.
    fn parse_and_update_balances(&self, result: &Value, from_snapshot: bool) {
        let Some(entries) = result.get("balances").and_then(Value::as_array) else {
            return;
        };
        let parsed = entries
            .iter()
            .filter_map(|entry| {
                let asset = entry.get("asset").and_then(Value::as_str)?.to_string();
                let free = entry.get("free").and_then(Value::as_str)?.parse().ok()?;
                let locked = entry.get("locked").and_then(Value::as_str)?.parse().ok()?;
                Some((asset, Balance { free, locked }))
            })
            .collect::<Vec<_>>();

        let mut state = self.state.lock().unwrap();
        if from_snapshot {
            state.balances.replace_all(parsed);
            state.balance_ready = true;
        } else {
            state.balances.apply_delta(parsed);
        }
    }

    /// §4.6: FILLED BUY finalizes the pending position and enters
    /// IN_POSITION; FILLED SELL books PnL and starts the SLEEPING cooldown.
    /// Any other status/state combination is ignored — the state machine
    /// tolerates fills and trade ticks arriving in either order (§5).
    fn process_order(&self, order: &OrderReport) {
        if order.symbol != self.config.symbol {
            return;
        }
        if !order.status.is_filled() {
            return;
        }

        let mut state = self.state.lock().unwrap();
        match state.status {
            Status::EnteringPosition if state.position.is_some() => {
                let amount = state.position.unwrap().amount;
                let position = Position::from_fill(
                    amount,
                    order.last_executed_price,
                    order.transaction_time,
                    self.config.position_sl_percent,
                );
                state.position = Some(position);
                state.status = Status::InPosition;
                info!(
                    channel = "trader",
                    price = order.last_executed_price,
                    quantity = order.last_executed_quantity,
                    "position entered"
                );
            }
            Status::ClosingPosition => {
                let Some(position) = state.position else { return };
                let base_asset = state.symbol.as_ref().map(|s| s.base_asset.as_str()).unwrap_or_default();
                let pnl = calculate_pnl(&position, order, base_asset);
                if pnl > 0.0 {
                    state.counters.tp_trades += 1;
                } else {
                    state.counters.sl_trades += 1;
                }
                state.counters.total_pnl += pnl;
                state.status = Status::Sleeping;
                state.sleeping_at = order.transaction_time + (self.config.position_sleep_time_secs as i64) * 1000;
                state.position = None;
                info!(channel = "trader", pnl, "position closed");
            }
            _ => {}
        }
    }

    /// §4.6: IN_POSITION → CLOSING_POSITION on TP/SL, emitting the SELL.
    fn check_position_actions(&self) {
        let (amount, take_profit, stop_loss) = {
            let state = self.state.lock().unwrap();
            let Some(position) = state.position else { return };
            (
                position.amount,
                position.take_profit_hit(state.last_price),
                position.stop_loss_hit(state.last_price),
            )
        };

        if !take_profit && !stop_loss {
            return;
        }

        self.state.lock().unwrap().status = Status::ClosingPosition;
        info!(channel = "trader", take_profit, stop_loss, "closing position");
        self.orders.place_order(OrderSide::Sell, amount);
    }

    /// §4.6's entry preconditions. Either failing is fatal. On success,
    /// transitions READY → ENTERING_POSITION and emits the BUY. Guards on
    /// `status == READY` itself so the Time Watcher (§4.7) can call this
    /// unconditionally every tick without duplicating the check.
    fn create_new_position(&self) {
        if self.state.lock().unwrap().status != Status::Ready {
            return;
        }

        let (quote_asset, min_notional, free_quote, last_price) = {
            let state = self.state.lock().unwrap();
            let Some(symbol) = &state.symbol else { return };
            (
                symbol.quote_asset.clone(),
                symbol.min_notional,
                state.balances.free(&symbol.quote_asset),
                state.last_price,
            )
        };

        let quantity = self.config.position_quantity;
        let notional = quantity * last_price;

        if free_quote < notional {
            self.exit_with_error(&format!(
                "insufficient {quote_asset} balance: have {free_quote}, need {notional}"
            ));
            return;
        }
        if let Some(min_notional) = min_notional {
            if notional < min_notional {
                self.exit_with_error(&format!("order notional {notional} is below min_notional {min_notional}"));
                return;
            }
        }

        let mut state = self.state.lock().unwrap();
        state.status = Status::EnteringPosition;
        state.position = Some(Position::pending(quantity));
        drop(state);

        info!(channel = "trader", last_price, "entering new position");
        self.orders.place_order(OrderSide::Buy, quantity);
    }

    /// §4.7's per-tick work, run by the Time Watcher task on its own
    /// schedule rather than in response to a bus message: wakes the bot
    /// from SLEEPING once the cooldown elapses, requests an entry attempt
    /// while READY (so the bot doesn't stall waiting for the next trade
    /// tick after cool-down), and closes an open position once its hold
    /// time has elapsed.
    pub fn time_watcher_tick(&self) {
        let now = self.clock.now_ms();

        let wake_from_sleep = {
            let state = self.state.lock().unwrap();
            state.status == Status::Sleeping && state.sleeping_at != 0 && now >= state.sleeping_at
        };
        if wake_from_sleep {
            let mut state = self.state.lock().unwrap();
            state.status = Status::Ready;
            state.sleeping_at = 0;
            info!(channel = "time_watcher", "cooldown complete, ready for entry");
        }

        if self.state.lock().unwrap().status == Status::Ready {
            self.create_new_position();
        }

        let hold_time_expired_with_amount = {
            let state = self.state.lock().unwrap();
            match (state.status, state.position) {
                (Status::InPosition, Some(position))
                    if position.hold_time_expired(now, self.config.position_hold_time_secs) =>
                {
                    Some(position.amount)
                }
                _ => None,
            }
        };
        if let Some(amount) = hold_time_expired_with_amount {
            self.state.lock().unwrap().status = Status::ClosingPosition;
            info!(channel = "time_watcher", "closing position: hold time exceeded");
            self.orders.place_order(OrderSide::Sell, amount);
        }
    }

    /// §4.6's single fatal-path primitive: log at `error`, self-deliver
    /// `SIGTERM`, and return. Process teardown is the Supervisor's signal
    /// handler reacting to that signal (§5, §6a) — this function never
    /// calls `exit` itself.
    pub fn exit_with_error(&self, message: &str) {
        let state = self.state.lock().unwrap().clone();
        error!(channel = "trader", status = ?state.status, last_price = state.last_price, "{message}");
        self.fatal.store(true, Ordering::SeqCst);
        unsafe {
            libc::kill(libc::getpid(), libc::SIGTERM);
        }
    }
}

fn balance_delta_entries(entries: &[Value]) -> Vec<(String, Balance)> {
    entries
        .iter()
        .filter_map(|entry| {
            let asset = entry.get("a").and_then(Value::as_str)?.to_string();
            let free = entry.get("f").and_then(Value::as_str)?.parse().ok()?;
            let locked = entry.get("l").and_then(Value::as_str)?.parse().ok()?;
            Some((asset, Balance { free, locked }))
        })
        .collect()
}

fn find_filter_field(filters: Option<&Vec<Value>>, filter_type: &str, field: &str) -> Option<f64> {
    filters?
        .iter()
        .find(|f| f.get("filterType").and_then(Value::as_str) == Some(filter_type))
        .and_then(|f| f.get(field))
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
}
