//! Spread detector and fee configuration.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::detector::DetectorConfig;
use crate::domain::fee::FeeSchedule;
use crate::domain::money::{Price, Volume};

/// Spread detector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorAppConfig {
    /// Absolute per-share edge in KRW. When unset the ratio/tick rule applies.
    #[serde(default)]
    pub min_edge: Option<Price>,
    /// Edge as a fraction of the buy-side ask (e.g. 0.0001 = 1bp).
    #[serde(default = "default_edge_ratio")]
    pub edge_ratio: Decimal,
    #[serde(default = "default_tick_size")]
    pub tick_size: Price,
    #[serde(default = "default_max_trips_per_symbol")]
    pub max_trips_per_symbol: u32,
    #[serde(default = "default_max_quote_age_ms")]
    pub max_quote_age_ms: u64,
    #[serde(default = "default_clips_per_intent")]
    pub clips_per_intent: u32,
}

fn default_edge_ratio() -> Decimal {
    Decimal::new(1, 4)
}

fn default_tick_size() -> Decimal {
    Decimal::ONE
}

const fn default_max_trips_per_symbol() -> u32 {
    20
}

const fn default_max_quote_age_ms() -> u64 {
    3000
}

const fn default_clips_per_intent() -> u32 {
    1
}

impl Default for DetectorAppConfig {
    fn default() -> Self {
        Self {
            min_edge: None,
            edge_ratio: default_edge_ratio(),
            tick_size: default_tick_size(),
            max_trips_per_symbol: default_max_trips_per_symbol(),
            max_quote_age_ms: default_max_quote_age_ms(),
            clips_per_intent: default_clips_per_intent(),
        }
    }
}

impl DetectorAppConfig {
    /// Convert to the detector's core settings; intents are sized in clips.
    #[must_use]
    pub fn to_core_config(&self, clip_size: Volume) -> DetectorConfig {
        DetectorConfig {
            min_edge: self.min_edge,
            edge_ratio: self.edge_ratio,
            tick_size: self.tick_size,
            max_trips_per_symbol: self.max_trips_per_symbol,
            max_quote_age: Duration::milliseconds(
                i64::try_from(self.max_quote_age_ms).unwrap_or(i64::MAX),
            ),
            clip_size,
            clips_per_intent: self.clips_per_intent,
        }
    }
}

/// Per-venue fee rates as fractions of notional.
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_krx_fee")]
    pub krx: Decimal,
    #[serde(default = "default_nxt_fee")]
    pub nxt: Decimal,
}

fn default_krx_fee() -> Decimal {
    Decimal::new(15, 5)
}

fn default_nxt_fee() -> Decimal {
    Decimal::new(145, 6)
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            krx: default_krx_fee(),
            nxt: default_nxt_fee(),
        }
    }
}

impl From<&FeeConfig> for FeeSchedule {
    fn from(config: &FeeConfig) -> Self {
        Self::new(config.krx, config.nxt)
    }
}
