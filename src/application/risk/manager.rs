//! Risk and exposure management service.
//!
//! Sole authority to approve trade intents. Tracks per-symbol exposure from
//! fills, asserts every session ends flat, and owns the kill switch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::error_window::ErrorWindow;
use super::exposure_book::ExposureBook;
use super::kill_switch::KillSwitch;
use crate::domain::exposure::ExposureRecord;
use crate::domain::fee::FeeSchedule;
use crate::domain::fill::Fill;
use crate::domain::id::{SessionId, Symbol};
use crate::domain::intent::TradeIntent;
use crate::domain::money::{Price, Volume};
use crate::error::{ExecutionError, FailureClass, RiskError};
use crate::port::inbound::risk::{ApprovalResult, ApprovedIntent};
use crate::port::outbound::notifier::{Event, EventKind, Notifier};

/// Risk limits.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    /// Largest absolute position a symbol may carry, in shares.
    pub max_position_per_symbol: Volume,
    /// Realized P/L below this engages the kill switch.
    pub pl_floor: Price,
    /// Consecutive broker errors that engage the kill switch.
    pub max_consecutive_errors: u32,
    /// Window the consecutive errors must fall in.
    pub error_window: Duration,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_per_symbol: Decimal::from(100),
            pl_floor: Decimal::from(-1_000_000),
            max_consecutive_errors: 5,
            error_window: Duration::from_secs(60),
        }
    }
}

/// Risk manager shared by the engine and every execution session.
pub struct RiskManager {
    limits: RiskLimits,
    fees: FeeSchedule,
    book: ExposureBook,
    kill_switch: KillSwitch,
    errors: Mutex<ErrorWindow>,
    trading_open: AtomicBool,
    notifier: Arc<dyn Notifier>,
}

impl RiskManager {
    /// Create a manager. Trading starts closed until [`Self::on_session_open`].
    pub fn new(limits: RiskLimits, fees: FeeSchedule, notifier: Arc<dyn Notifier>) -> Self {
        let errors = ErrorWindow::new(limits.max_consecutive_errors, limits.error_window);
        Self {
            limits,
            fees,
            book: ExposureBook::new(),
            kill_switch: KillSwitch::new(),
            errors: Mutex::new(errors),
            trading_open: AtomicBool::new(false),
            notifier,
        }
    }

    /// Approve or reject an intent.
    ///
    /// On approval the symbol's session slot is claimed before returning; the
    /// check and the claim happen under the symbol's lock.
    pub fn approve(&self, intent: &TradeIntent) -> ApprovalResult {
        let symbol = intent.symbol();
        match self.try_approve(intent) {
            Ok(session_id) => {
                info!(
                    symbol = %symbol,
                    session_id = %session_id,
                    buy = %intent.buy_venue(),
                    sell = %intent.sell_venue(),
                    qty = %intent.target_qty(),
                    spread = %intent.reference_spread(),
                    "Intent approved"
                );
                ApprovalResult::Approved(ApprovedIntent {
                    session_id,
                    intent: intent.clone(),
                })
            }
            Err(e) => {
                debug!(symbol = %symbol, reason = %e, "Intent rejected");
                self.notifier.notify(Event::intent_rejected(symbol, &e));
                ApprovalResult::Rejected(e)
            }
        }
    }

    fn try_approve(&self, intent: &TradeIntent) -> Result<SessionId, RiskError> {
        self.check_kill_switch()?;
        if !self.trading_open.load(Ordering::SeqCst) {
            return Err(RiskError::TradingClosed);
        }

        let session_id = SessionId::new();
        let limit = self.limits.max_position_per_symbol;
        let additional = intent.target_qty();
        self.book
            .try_open(intent.symbol(), session_id.clone(), |record| {
                let current = record.net_position().abs();
                if current + additional > limit {
                    return Err(RiskError::PositionLimitExceeded {
                        symbol: intent.symbol().clone(),
                        current,
                        additional,
                        limit,
                    });
                }
                Ok(())
            })?;
        Ok(session_id)
    }

    fn check_kill_switch(&self) -> Result<(), RiskError> {
        if self.kill_switch.is_engaged() {
            let reason = self
                .kill_switch
                .reason()
                .unwrap_or_else(|| "unknown".to_string());
            return Err(RiskError::KillSwitchEngaged { reason });
        }
        Ok(())
    }

    /// Apply a fill to exposure. Replayed fills are ignored and return `None`.
    ///
    /// Engages the kill switch when process-wide realized P/L falls below the
    /// configured floor.
    pub fn on_fill(&self, fill: &Fill) -> Option<Price> {
        let fee = self.fees.fee(fill.venue, fill.price, fill.qty);
        let Some(applied) = self.book.apply_fill(fill, fee) else {
            debug!(fill_id = %fill.fill_id, "Duplicate fill ignored");
            return None;
        };

        debug!(
            symbol = %fill.symbol,
            side = %fill.side,
            qty = %fill.qty,
            price = %fill.price,
            net_position = %applied.net_position,
            realized = %applied.realized,
            "Fill applied"
        );
        self.notifier.notify(Event::now(EventKind::Fill(fill.clone())));

        let total = self.book.total_realized_pl();
        if total < self.limits.pl_floor {
            self.engage_kill_switch(format!(
                "cumulative P/L {total} below floor {}",
                self.limits.pl_floor
            ));
        }
        Some(applied.realized)
    }

    /// Close the books on a finished session.
    ///
    /// Releases the symbol's slot and returns whether the symbol is flat. A
    /// non-flat symbol raises a residual alert and engages the kill switch.
    pub fn on_session_closed(&self, symbol: &Symbol, session_id: &SessionId) -> bool {
        let released = self.book.release(symbol, session_id);
        if !released {
            warn!(symbol = %symbol, session_id = %session_id, "Closed session did not hold the slot");
        }

        let net_position = self.book.net_position(symbol);
        if net_position.is_zero() {
            return true;
        }

        self.raise_residual(
            symbol,
            net_position,
            format!("session {session_id} ended with open inventory"),
        );
        false
    }

    /// Check a symbol after a fill that arrived with no live session.
    pub fn on_late_fill(&self, fill: &Fill) {
        if self.on_fill(fill).is_none() {
            return;
        }
        if self.book.has_open_session(&fill.symbol) {
            return;
        }
        let net_position = self.book.net_position(&fill.symbol);
        if !net_position.is_zero() {
            self.raise_residual(
                &fill.symbol,
                net_position,
                format!("late fill {} left inventory", fill.fill_id),
            );
        }
    }

    fn raise_residual(&self, symbol: &Symbol, net_position: Volume, detail: String) {
        error!(symbol = %symbol, net_position = %net_position, detail = %detail, "Residual position");
        self.notifier.notify(Event::now(EventKind::ResidualAlert {
            symbol: symbol.clone(),
            net_position,
            detail,
        }));
        self.engage_kill_switch(format!("residual position {net_position} on {symbol}"));
    }

    /// Feed a broker call outcome into the consecutive-error counter.
    ///
    /// Venue rejects are answers, not failures, and leave the streak alone.
    pub fn record_broker_result<T>(&self, result: &Result<T, ExecutionError>) {
        match result {
            Ok(_) => self.errors.lock().record_success(),
            Err(e) if e.class() == FailureClass::Rejected => {}
            Err(e) => {
                let tripped = self.errors.lock().record_error(Instant::now());
                if tripped {
                    self.engage_kill_switch(format!(
                        "{} consecutive broker errors, last: {e}",
                        self.limits.max_consecutive_errors
                    ));
                }
            }
        }
    }

    /// Broker session lost.
    pub fn on_broker_disconnected(&self, reason: &str) {
        self.engage_kill_switch(format!("broker disconnected: {reason}"));
    }

    /// Engage the kill switch; idempotent.
    pub fn engage_kill_switch(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.kill_switch.engage(reason.clone()) {
            error!(reason = %reason, "Kill switch engaged");
            self.notifier
                .notify(Event::now(EventKind::KillSwitchEngaged { reason }));
        }
    }

    /// Operator action: clear the kill switch and the error streak.
    pub fn reset_kill_switch(&self) {
        if self.kill_switch.reset() {
            self.errors.lock().record_success();
            info!("Kill switch reset by operator");
            self.notifier.notify(Event::now(EventKind::KillSwitchReset));
        }
    }

    #[must_use]
    pub fn is_kill_switch_engaged(&self) -> bool {
        self.kill_switch.is_engaged()
    }

    #[must_use]
    pub fn kill_switch_reason(&self) -> Option<String> {
        self.kill_switch.reason()
    }

    /// Receiver that flips to `true` when the kill switch engages.
    #[must_use]
    pub fn kill_switch_watch(&self) -> watch::Receiver<bool> {
        self.kill_switch.subscribe()
    }

    /// Session clock opened trading; processed fill ids roll over.
    pub fn on_session_open(&self) {
        self.book.clear_fill_history();
        self.trading_open.store(true, Ordering::SeqCst);
        info!("Trading open");
    }

    /// Session clock stopped new trading.
    pub fn on_session_closing(&self) {
        self.trading_open.store(false, Ordering::SeqCst);
        info!("Trading closed to new intents");
    }

    #[must_use]
    pub fn is_trading_open(&self) -> bool {
        self.trading_open.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn has_open_session(&self, symbol: &Symbol) -> bool {
        self.book.has_open_session(symbol)
    }

    #[must_use]
    pub fn net_position(&self, symbol: &Symbol) -> Volume {
        self.book.net_position(symbol)
    }

    #[must_use]
    pub fn exposure(&self, symbol: &Symbol) -> Option<ExposureRecord> {
        self.book.snapshot(symbol)
    }

    /// Realized P/L across all symbols, net of fees.
    #[must_use]
    pub fn cumulative_pl(&self) -> Price {
        self.book.total_realized_pl()
    }

    #[must_use]
    pub fn non_flat_symbols(&self) -> Vec<(Symbol, Volume)> {
        self.book.non_flat_symbols()
    }

    #[must_use]
    pub const fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    #[must_use]
    pub const fn limits(&self) -> &RiskLimits {
        &self.limits
    }
}
