//! Spread detector behaviour across both venues.

use std::sync::Arc;

use chrono::{Duration, Utc};
use crossarb::application::detector::{DetectorConfig, SpreadDetector};
use crossarb::application::risk::{RiskLimits, RiskManager};
use crossarb::domain::fee::{net_spread, FeeSchedule};
use crossarb::domain::id::Symbol;
use crossarb::domain::quote::Quote;
use crossarb::domain::venue::Venue;
use crossarb::port::outbound::notifier::{EventKind, Notifier};
use crossarb::testkit::domain::{intent, quote, SYMBOL};
use crossarb::testkit::notifier::RecordingNotifier;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct Fixture {
    detector: SpreadDetector,
    risk: Arc<RiskManager>,
    notifier: Arc<RecordingNotifier>,
}

fn fixture(config: DetectorConfig) -> Fixture {
    let notifier = Arc::new(RecordingNotifier::new());
    let dyn_notifier: Arc<dyn Notifier> = notifier.clone();
    let risk = Arc::new(RiskManager::new(
        RiskLimits::default(),
        FeeSchedule::default(),
        dyn_notifier.clone(),
    ));
    risk.on_session_open();
    let detector = SpreadDetector::new(config, FeeSchedule::default(), risk.clone(), dyn_notifier);
    Fixture {
        detector,
        risk,
        notifier,
    }
}

#[test]
fn crossed_nxt_bid_emits_krx_to_nxt_intent() {
    let f = fixture(DetectorConfig::default());
    let now = Utc::now();

    assert!(f
        .detector
        .on_quote_at(quote(SYMBOL, Venue::Krx, dec!(10000), dec!(10010)), now)
        .is_none());
    let intent = f
        .detector
        .on_quote_at(quote(SYMBOL, Venue::Nxt, dec!(10050), dec!(10060)), now)
        .expect("spread should clear the buffer");

    assert_eq!(intent.symbol(), &Symbol::from(SYMBOL));
    assert_eq!(intent.buy_venue(), Venue::Krx);
    assert_eq!(intent.sell_venue(), Venue::Nxt);
    assert_eq!(intent.target_qty(), dec!(1));
    assert_eq!(intent.reference_spread(), dec!(37.041250));
}

#[test]
fn never_emits_when_net_spread_is_within_buffer() {
    let config = DetectorConfig::default();
    let fees = FeeSchedule::default();
    let now = Utc::now();
    let krx = quote(SYMBOL, Venue::Krx, dec!(10000), dec!(10010));

    for step in 0..=60 {
        let nxt_bid = dec!(10000) + Decimal::from(step);
        let nxt = quote(SYMBOL, Venue::Nxt, nxt_bid, nxt_bid + dec!(10));
        let forward = net_spread(&krx, &nxt, &fees);
        assert!(net_spread(&nxt, &krx, &fees) < Decimal::ZERO);

        let f = fixture(config.clone());
        f.detector.on_quote_at(krx.clone(), now);
        let emitted = f.detector.on_quote_at(nxt, now);

        assert_eq!(
            emitted.is_some(),
            forward > config.buffer(dec!(10010)),
            "nxt bid {nxt_bid}: net {forward}"
        );
    }
}

#[test]
fn absolute_min_edge_overrides_ratio() {
    let f = fixture(DetectorConfig {
        min_edge: Some(dec!(40)),
        ..DetectorConfig::default()
    });
    let now = Utc::now();
    f.detector
        .on_quote_at(quote(SYMBOL, Venue::Krx, dec!(10000), dec!(10010)), now);

    // Net 37.04 clears the 1.001 ratio buffer but not the 40 KRW edge.
    assert!(f
        .detector
        .on_quote_at(quote(SYMBOL, Venue::Nxt, dec!(10050), dec!(10060)), now)
        .is_none());
    assert!(f
        .detector
        .on_quote_at(quote(SYMBOL, Venue::Nxt, dec!(10060), dec!(10070)), now)
        .is_some());
}

#[test]
fn reverse_direction_when_krx_is_rich() {
    let f = fixture(DetectorConfig::default());
    let now = Utc::now();
    f.detector
        .on_quote_at(quote(SYMBOL, Venue::Nxt, dec!(20000), dec!(20010)), now);
    let intent = f
        .detector
        .on_quote_at(quote(SYMBOL, Venue::Krx, dec!(20100), dec!(20110)), now)
        .unwrap();

    assert_eq!(intent.buy_venue(), Venue::Nxt);
    assert_eq!(intent.sell_venue(), Venue::Krx);
}

#[test]
fn stale_quote_counts_as_no_liquidity() {
    let f = fixture(DetectorConfig::default());
    let now = Utc::now();
    let old = Quote::try_new(
        SYMBOL,
        Venue::Krx,
        dec!(10000),
        dec!(10),
        dec!(10010),
        dec!(10),
        now - Duration::seconds(5),
    )
    .unwrap();
    f.detector.on_quote_at(old, now);

    assert!(f
        .detector
        .on_quote_at(quote(SYMBOL, Venue::Nxt, dec!(10050), dec!(10060)), now)
        .is_none());
}

#[test]
fn older_quote_does_not_replace_newer() {
    let f = fixture(DetectorConfig::default());
    let now = Utc::now();
    let symbol = Symbol::from(SYMBOL);
    let newer = Quote::try_new(SYMBOL, Venue::Krx, dec!(100), dec!(1), dec!(101), dec!(1), now).unwrap();
    let older = Quote::try_new(
        SYMBOL,
        Venue::Krx,
        dec!(90),
        dec!(1),
        dec!(91),
        dec!(1),
        now - Duration::milliseconds(10),
    )
    .unwrap();

    f.detector.on_quote_at(newer, now);
    f.detector.on_quote_at(older, now);

    let held = f.detector.quote(&symbol, Venue::Krx).unwrap();
    assert_eq!(held.bid_price(), dec!(100));
}

#[test]
fn open_session_suppresses_new_intents() {
    let f = fixture(DetectorConfig::default());
    let now = Utc::now();
    assert!(f.risk.approve(&intent(SYMBOL, Venue::Krx, dec!(1))).is_approved());

    f.detector
        .on_quote_at(quote(SYMBOL, Venue::Krx, dec!(10000), dec!(10010)), now);
    assert!(f
        .detector
        .on_quote_at(quote(SYMBOL, Venue::Nxt, dec!(10050), dec!(10060)), now)
        .is_none());
    assert_eq!(f.detector.trips_today(&Symbol::from(SYMBOL)), 0);
}

#[test]
fn trip_counter_caps_emissions_until_reset() {
    let f = fixture(DetectorConfig {
        max_trips_per_symbol: 2,
        ..DetectorConfig::default()
    });
    let now = Utc::now();
    let symbol = Symbol::from(SYMBOL);
    f.detector
        .on_quote_at(quote(SYMBOL, Venue::Krx, dec!(10000), dec!(10010)), now);

    // Every emitted intent is approved and counted.
    let emitted = (0..5)
        .filter(|_| {
            let intent = f
                .detector
                .on_quote_at(quote(SYMBOL, Venue::Nxt, dec!(10050), dec!(10060)), now);
            if let Some(intent) = &intent {
                f.detector.record_trip(intent.symbol(), now);
            }
            intent.is_some()
        })
        .count();
    assert_eq!(emitted, 2);
    assert_eq!(f.detector.trips_today(&symbol), 2);

    f.detector.reset_trips();
    assert_eq!(f.detector.trips_today(&symbol), 0);
    assert!(f
        .detector
        .on_quote_at(quote(SYMBOL, Venue::Nxt, dec!(10050), dec!(10060)), now)
        .is_some());
}

#[test]
fn unapproved_intents_do_not_use_trips() {
    let f = fixture(DetectorConfig {
        max_trips_per_symbol: 1,
        ..DetectorConfig::default()
    });
    let now = Utc::now();
    f.detector
        .on_quote_at(quote(SYMBOL, Venue::Krx, dec!(10000), dec!(10010)), now);

    for _ in 0..3 {
        assert!(f
            .detector
            .on_quote_at(quote(SYMBOL, Venue::Nxt, dec!(10050), dec!(10060)), now)
            .is_some());
    }
    assert_eq!(f.detector.trips_today(&Symbol::from(SYMBOL)), 0);
}

#[test]
fn malformed_quote_is_dropped_and_every_valid_tick_is_logged() {
    let f = fixture(DetectorConfig::default());
    let now = Utc::now();
    let crossed: Quote = serde_json::from_value(serde_json::json!({
        "symbol": SYMBOL,
        "venue": "krx",
        "bid_price": "10020",
        "bid_qty": "1",
        "ask_price": "10010",
        "ask_qty": "1",
        "timestamp": now,
    }))
    .unwrap();

    assert!(f.detector.on_quote_at(crossed, now).is_none());
    assert!(f.detector.quote(&Symbol::from(SYMBOL), Venue::Krx).is_none());

    f.detector
        .on_quote_at(quote(SYMBOL, Venue::Krx, dec!(10000), dec!(10010)), now);
    assert_eq!(
        f.notifier
            .count(|kind| matches!(kind, EventKind::TickLogged(_))),
        1
    );
}
