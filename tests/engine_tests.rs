//! Engine loop: replay input, subscriptions and broker session events.

use std::sync::Arc;
use std::time::Duration;

use crossarb::adapter::inbound::replay::ReplayFeed;
use crossarb::domain::id::{ClientOrderId, Symbol};
use crossarb::domain::session::SessionOutcome;
use crossarb::domain::venue::{Side, Venue};
use crossarb::error::ExecutionError;
use crossarb::infrastructure::bootstrap;
use crossarb::port::inbound::session::SessionSignal;
use crossarb::port::outbound::broker::BrokerEvent;
use crossarb::port::outbound::notifier::{EventKind, Notifier};
use crossarb::testkit::broker::{CallKind, ScriptedBroker};
use crossarb::testkit::config::{config_with_symbols, test_config};
use crossarb::testkit::domain::{fill, SYMBOL};
use crossarb::testkit::harness::EngineHarness;
use crossarb::testkit::notifier::RecordingNotifier;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;

const FEED: &str = r#"
{"type":"session","signal":"open"}
{"type":"quote","symbol":"005930","venue":"krx","bid":"10000","bid_qty":"50","ask":"10010","ask_qty":"40"}
{"type":"quote","symbol":"005930","venue":"nxt","bid":"10100","bid_qty":"5","ask":"10090","ask_qty":"5"}
{"type":"quote","symbol":"005930","venue":"nxt","bid":"10050","bid_qty":"20","ask":"10060","ask_qty":"20"}
{"type":"wait","ms":500}
{"type":"session","signal":"closed"}
"#;

#[tokio::test(start_paused = true)]
async fn replayed_feed_drives_a_full_session() {
    let feed = ReplayFeed::parse(FEED.as_bytes()).unwrap();
    assert_eq!(feed.len(), 6);

    let (broker, broker_events) = ScriptedBroker::new();
    let broker = Arc::new(broker);
    let notifier = Arc::new(RecordingNotifier::new());
    let runtime = bootstrap::build_runtime(
        &test_config(),
        broker.clone(),
        broker_events,
        notifier.clone() as Arc<dyn Notifier>,
    );

    let (tx, rx) = mpsc::channel(16);
    let player = tokio::spawn(feed.play(tx));
    let summary = runtime.engine.run(rx, runtime.broker_events).await;

    // The crossed NXT quote is dropped by the player.
    assert_eq!(player.await.unwrap(), 4);
    assert_eq!(summary.quotes, 2);
    assert_eq!(summary.intents, 1);
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].outcome, SessionOutcome::Completed);
    assert_eq!(summary.filled_qty(), dec!(1));
    assert!(!runtime.risk.is_trading_open());
    assert_eq!(
        notifier.count(|k| matches!(k, EventKind::SessionCompleted(_))),
        1
    );
    assert_eq!(
        notifier.count(|k| matches!(k, EventKind::OrderSubmitted(_))),
        2
    );
    assert_eq!(broker.orders().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn intents_before_the_open_are_rejected() {
    let (broker, events) = ScriptedBroker::new();
    let harness = EngineHarness::start(&test_config(), broker, events);

    harness.quote(Venue::Krx, dec!(10000), dec!(10010)).await;
    harness.quote(Venue::Nxt, dec!(10050), dec!(10060)).await;
    let broker = harness.broker.clone();
    let summary = harness.finish().await;

    assert_eq!(summary.intents, 1);
    assert_eq!(summary.rejected_intents, 1);
    assert!(summary.reports.is_empty());
    assert!(broker.orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn subscriptions_retry_transient_failures() {
    let (broker, broker_events) = ScriptedBroker::new();
    let broker = Arc::new(broker.with_subscribe_results(vec![Err(
        ExecutionError::BrokerUnavailable("gateway warming up".into()),
    )]));
    let runtime = bootstrap::build_runtime(
        &config_with_symbols(&["005930", "000660"]),
        broker.clone(),
        broker_events,
        Arc::new(RecordingNotifier::new()),
    );

    let failures = runtime.engine.subscribe_all().await;

    assert_eq!(failures, 0);
    let subscribed: Vec<(String, Venue)> = broker
        .calls()
        .into_iter()
        .filter_map(|call| match call.kind {
            CallKind::Subscribe { symbol, venue } => Some((symbol.to_string(), venue)),
            _ => None,
        })
        .collect();
    assert_eq!(
        subscribed,
        vec![
            ("005930".to_string(), Venue::Krx),
            ("005930".to_string(), Venue::Krx),
            ("005930".to_string(), Venue::Nxt),
            ("000660".to_string(), Venue::Krx),
            ("000660".to_string(), Venue::Nxt),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn persistent_subscription_failure_is_reported() {
    let unavailable = || Err(ExecutionError::BrokerUnavailable("down".into()));
    let (broker, broker_events) = ScriptedBroker::new();
    let broker = Arc::new(broker.with_subscribe_results(vec![
        unavailable(),
        unavailable(),
        unavailable(),
    ]));
    let notifier = Arc::new(RecordingNotifier::new());
    let runtime = bootstrap::build_runtime(
        &test_config(),
        broker.clone(),
        broker_events,
        notifier.clone() as Arc<dyn Notifier>,
    );

    let failures = runtime.engine.subscribe_all().await;

    assert_eq!(failures, 1);
    assert_eq!(broker.calls().len(), 4);
    assert_eq!(
        notifier.count(|k| matches!(k, EventKind::RateLimitWarning { detail, .. } if detail.contains("subscribe"))),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn broker_disconnect_engages_kill_switch() {
    let (broker, events) = ScriptedBroker::new();
    let harness = EngineHarness::start(&test_config(), broker, events);

    harness.open().await;
    harness.broker.push(BrokerEvent::Connected);
    harness.broker.push(BrokerEvent::Disconnected {
        reason: "heartbeat lost".into(),
    });
    while !harness.risk.is_kill_switch_engaged() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    harness.quote(Venue::Krx, dec!(10000), dec!(10010)).await;
    harness.quote(Venue::Nxt, dec!(10050), dec!(10060)).await;
    let broker = harness.broker.clone();
    let summary = harness.finish().await;

    assert_eq!(
        summary.kill_switch.as_deref(),
        Some("broker disconnected: heartbeat lost")
    );
    assert_eq!(summary.rejected_intents, 1);
    assert!(summary.reports.is_empty());
    assert!(broker.orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_fill_is_booked_once_and_flagged() {
    let (broker, events) = ScriptedBroker::new();
    let harness = EngineHarness::start(&test_config(), broker, events);
    let stray = fill("ORPHAN-1", SYMBOL, Venue::Nxt, Side::Buy, dec!(2), dec!(10060));
    assert_eq!(
        stray.client_order_id,
        ClientOrderId::new("ORPHAN-1-order")
    );

    harness.broker.push(BrokerEvent::Fill(stray.clone()));
    harness.broker.push(BrokerEvent::Fill(stray));
    let risk = harness.risk.clone();
    let notifier = harness.notifier.clone();
    let summary = harness.finish().await;

    assert_eq!(risk.net_position(&Symbol::from(SYMBOL)), dec!(2));
    assert_eq!(
        notifier.count(|k| matches!(k, EventKind::ResidualAlert { .. })),
        1
    );
    assert!(summary
        .kill_switch
        .is_some_and(|reason| reason.contains("residual")));
}

#[tokio::test(start_paused = true)]
async fn reopen_resets_trip_counters() {
    let mut config = test_config();
    config.detector.max_trips_per_symbol = 1;
    let (broker, events) = ScriptedBroker::new();
    let harness = EngineHarness::start(&config, broker, events);

    harness.open().await;
    harness.quote(Venue::Krx, dec!(10000), dec!(10010)).await;
    harness.quote(Venue::Nxt, dec!(10050), dec!(10060)).await;
    harness.wait_for_orders(2).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Trip limit reached: no new intent until the next open.
    harness.quote(Venue::Nxt, dec!(10050), dec!(10060)).await;
    harness.signal(SessionSignal::Closed).await;
    harness.open().await;
    harness.quote(Venue::Nxt, dec!(10050), dec!(10060)).await;
    let summary = harness.finish().await;

    assert_eq!(summary.intents, 2);
    assert_eq!(summary.reports.len(), 2);
    assert!(summary
        .reports
        .iter()
        .all(|r| r.outcome == SessionOutcome::Completed));
}

#[tokio::test(start_paused = true)]
async fn rejected_intents_keep_the_trip_budget() {
    let mut config = test_config();
    config.detector.max_trips_per_symbol = 2;
    let (broker, events) = ScriptedBroker::new();
    let harness = EngineHarness::start(&config, broker, events);

    harness.open().await;
    harness.risk.engage_kill_switch("operator drill");
    harness.quote(Venue::Krx, dec!(10000), dec!(10010)).await;
    for _ in 0..3 {
        harness.quote(Venue::Nxt, dec!(10050), dec!(10060)).await;
    }
    // Let the engine drain the blocked quotes before the reset.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(harness.broker.orders().is_empty());

    harness.risk.reset_kill_switch();
    harness.quote(Venue::Nxt, dec!(10050), dec!(10060)).await;
    let summary = harness.finish().await;

    assert_eq!(summary.intents, 4);
    assert_eq!(summary.rejected_intents, 3);
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].outcome, SessionOutcome::Completed);
    assert!(summary.kill_switch.is_none());
}
