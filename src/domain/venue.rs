//! Trading venues and order sides.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two venues quoting the same instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    /// Korea Exchange.
    Krx,
    /// Nextrade alternative venue.
    Nxt,
}

impl Venue {
    /// Both venues, in the order spread directions are evaluated.
    pub const ALL: [Venue; 2] = [Venue::Krx, Venue::Nxt];

    /// The other venue of the pair.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Krx => Self::Nxt,
            Self::Nxt => Self::Krx,
        }
    }

    /// Stable name used in logs and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Krx => "KRX",
            Self::Nxt => "NXT",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl Side {
    /// Opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_venue_round_trips() {
        assert_eq!(Venue::Krx.other(), Venue::Nxt);
        assert_eq!(Venue::Nxt.other().other(), Venue::Nxt);
    }

    #[test]
    fn venue_deserializes_lowercase() {
        let venue: Venue = serde_json::from_str("\"nxt\"").unwrap();
        assert_eq!(venue, Venue::Nxt);
    }
}
