//! Per-symbol exposure records with per-entry locking.

use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::domain::exposure::ExposureRecord;
use crate::domain::fill::Fill;
use crate::domain::id::{SessionId, Symbol};
use crate::domain::money::{Price, Volume};
use crate::error::RiskError;

/// Outcome of applying a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillApplied {
    pub realized: Price,
    pub net_position: Volume,
}

/// All exposure records, keyed by symbol.
///
/// Each operation holds the symbol's shard lock for its whole duration, so a
/// check followed by a write on the same record is atomic per symbol.
#[derive(Debug, Default)]
pub struct ExposureBook {
    records: DashMap<Symbol, ExposureRecord>,
}

impl ExposureBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `check` against the symbol's record and, if it passes, claim the
    /// session slot for `session`.
    pub fn try_open<F>(&self, symbol: &Symbol, session: SessionId, check: F) -> Result<(), RiskError>
    where
        F: FnOnce(&ExposureRecord) -> Result<(), RiskError>,
    {
        let mut record = self.records.entry(symbol.clone()).or_default();
        if record.open_intent().is_some() {
            return Err(RiskError::SessionAlreadyOpen {
                symbol: symbol.clone(),
            });
        }
        check(&*record)?;
        record.try_open(session);
        Ok(())
    }

    /// Release the slot held by `session`. Returns whether it was held.
    pub fn release(&self, symbol: &Symbol, session: &SessionId) -> bool {
        self.records
            .get_mut(symbol)
            .is_some_and(|mut record| record.release(session))
    }

    /// Apply a fill; `None` when it was already applied.
    pub fn apply_fill(&self, fill: &Fill, fee: Price) -> Option<FillApplied> {
        let mut record = self.records.entry(fill.symbol.clone()).or_default();
        let realized = record.apply_fill(fill, fee)?;
        Some(FillApplied {
            realized,
            net_position: record.net_position(),
        })
    }

    #[must_use]
    pub fn net_position(&self, symbol: &Symbol) -> Volume {
        self.records
            .get(symbol)
            .map_or(Decimal::ZERO, |r| r.net_position())
    }

    #[must_use]
    pub fn has_open_session(&self, symbol: &Symbol) -> bool {
        self.records
            .get(symbol)
            .is_some_and(|r| r.open_intent().is_some())
    }

    /// Copy of one record.
    #[must_use]
    pub fn snapshot(&self, symbol: &Symbol) -> Option<ExposureRecord> {
        self.records.get(symbol).map(|r| r.value().clone())
    }

    /// Realized P/L summed over every symbol.
    #[must_use]
    pub fn total_realized_pl(&self) -> Price {
        self.records.iter().map(|r| r.cumulative_pl()).sum()
    }

    /// Symbols currently holding inventory.
    #[must_use]
    pub fn non_flat_symbols(&self) -> Vec<(Symbol, Volume)> {
        let mut out: Vec<_> = self
            .records
            .iter()
            .filter(|r| !r.is_flat())
            .map(|r| (r.key().clone(), r.net_position()))
            .collect();
        out.sort();
        out
    }

    /// Forget processed fill ids on every record.
    pub fn clear_fill_history(&self) {
        for mut record in self.records.iter_mut() {
            record.clear_fill_history();
        }
    }
}
