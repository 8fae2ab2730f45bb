//! JSON-lines replay feed.
//!
//! Each non-blank line is one tagged record:
//!
//! ```text
//! {"type":"session","signal":"open"}
//! {"type":"quote","symbol":"005930","venue":"krx","bid":"10000","bid_qty":"50","ask":"10010","ask_qty":"40"}
//! {"type":"wait","ms":250}
//! ```
//!
//! Quotes without a `timestamp` are stamped when they are played, so a
//! recorded session replays as live data. Lines starting with `#` are ignored.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::application::orchestration::EngineInput;
use crate::domain::error::DomainError;
use crate::domain::id::Symbol;
use crate::domain::money::{Price, Volume};
use crate::domain::quote::Quote;
use crate::domain::venue::Venue;
use crate::error::{Error, Result};
use crate::port::inbound::session::SessionSignal;

/// One recorded quote.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRecord {
    pub symbol: Symbol,
    pub venue: Venue,
    pub bid: Price,
    pub bid_qty: Volume,
    pub ask: Price,
    pub ask_qty: Volume,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl QuoteRecord {
    /// Build the domain quote, stamping it with `now` when unstamped.
    ///
    /// # Errors
    ///
    /// Returns the validation error for malformed prices or sizes.
    pub fn to_quote(&self, now: DateTime<Utc>) -> std::result::Result<Quote, DomainError> {
        Quote::try_new(
            self.symbol.clone(),
            self.venue,
            self.bid,
            self.bid_qty,
            self.ask,
            self.ask_qty,
            self.timestamp.unwrap_or(now),
        )
    }
}

/// A line of the feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayEntry {
    Quote(QuoteRecord),
    Session { signal: SessionSignal },
    Wait { ms: u64 },
}

/// Parsed feed, ready to play into the engine.
#[derive(Debug, Clone, Default)]
pub struct ReplayFeed {
    entries: Vec<ReplayEntry>,
}

impl ReplayFeed {
    /// Parse a feed from any line reader.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Replay`] with the 1-based line number of the first
    /// line that is not a valid record, or an IO error.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self> {
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let entry = serde_json::from_str(trimmed).map_err(|source| Error::Replay {
                line: index + 1,
                source,
            })?;
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// Parse a feed file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    #[must_use]
    pub fn entries(&self) -> &[ReplayEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feed every entry to the engine in order.
    ///
    /// Malformed quotes are logged and skipped. Stops early if the engine
    /// has gone away. Returns the number of inputs delivered.
    pub async fn play(self, inputs: mpsc::Sender<EngineInput>) -> usize {
        let total = self.entries.len();
        let mut delivered = 0;

        for entry in self.entries {
            let input = match entry {
                ReplayEntry::Wait { ms } => {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    continue;
                }
                ReplayEntry::Session { signal } => EngineInput::Session(signal),
                ReplayEntry::Quote(record) => match record.to_quote(Utc::now()) {
                    Ok(quote) => EngineInput::Quote(quote),
                    Err(e) => {
                        warn!(symbol = %record.symbol, venue = %record.venue, error = %e, "Skipping malformed replay quote");
                        continue;
                    }
                },
            };
            if inputs.send(input).await.is_err() {
                debug!("Engine closed, replay stopped");
                break;
            }
            delivered += 1;
        }

        info!(entries = total, delivered, "Replay finished");
        delivered
    }
}
