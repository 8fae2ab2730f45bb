//! Gateway throttler: rate ceiling, ordering, priority and retries.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossarb::application::throttle::{GatewayThrottler, Lane, RetryPolicy, ThrottlerConfig};
use crossarb::domain::id::{OrderId, Symbol};
use crossarb::domain::venue::Venue;
use crossarb::error::ExecutionError;
use crossarb::port::outbound::broker::BrokerRequest;
use crossarb::port::outbound::notifier::{EventKind, Notifier};
use crossarb::testkit::broker::{CallKind, ScriptedBroker};
use crossarb::testkit::notifier::RecordingNotifier;

fn config(max_requests_per_sec: u32) -> ThrottlerConfig {
    ThrottlerConfig {
        max_requests_per_sec,
        call_timeout: Duration::from_secs(2),
    }
}

fn subscribe(code: &str) -> BrokerRequest {
    BrokerRequest::Subscribe {
        symbol: Symbol::from(code),
        venue: Venue::Krx,
    }
}

fn subscribed_symbols(broker: &ScriptedBroker) -> Vec<String> {
    broker
        .calls()
        .into_iter()
        .filter_map(|call| match call.kind {
            CallKind::Subscribe { symbol, .. } => Some(symbol.to_string()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn never_exceeds_ceiling_in_any_one_second_span() {
    let (broker, _events) = ScriptedBroker::new();
    let broker = Arc::new(broker);
    let notifier = Arc::new(RecordingNotifier::new());
    let (handle, _task) = GatewayThrottler::spawn(broker.clone(), notifier.clone(), &config(5));

    let pending: Vec<_> = (0..17)
        .map(|i| handle.enqueue(Lane::Normal, subscribe(&format!("S{i:02}"))).unwrap())
        .collect();
    for call in pending {
        call.reply().await.unwrap();
    }

    let calls = broker.calls();
    assert_eq!(calls.len(), 17);
    for pair in calls.windows(6) {
        let span = pair[5].admitted_at.duration_since(pair[0].admitted_at);
        assert!(span >= Duration::from_secs(1), "six calls within {span:?}");
    }
    for call in &calls {
        assert!(call.at >= call.admitted_at);
    }
    let first = calls[0].admitted_at;
    let last = calls[16].admitted_at;
    assert_eq!(last.duration_since(first), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn saturation_is_reported_not_dropped() {
    let (broker, _events) = ScriptedBroker::new();
    let broker = Arc::new(broker);
    let notifier = Arc::new(RecordingNotifier::new());
    let (handle, _task) = GatewayThrottler::spawn(
        broker.clone(),
        notifier.clone() as Arc<dyn Notifier>,
        &config(2),
    );

    let pending: Vec<_> = (0..4)
        .map(|i| handle.enqueue(Lane::Normal, subscribe(&format!("S{i}"))).unwrap())
        .collect();
    for call in pending {
        assert!(call.reply().await.is_ok());
    }

    assert_eq!(broker.calls().len(), 4);
    assert_eq!(
        notifier.count(|k| matches!(k, EventKind::RateLimitWarning { .. })),
        1
    );
    assert_eq!(handle.queued(), 0);
}

#[tokio::test(start_paused = true)]
async fn normal_lane_is_fifo() {
    let (broker, _events) = ScriptedBroker::new();
    let broker = Arc::new(broker);
    let (handle, _task) = GatewayThrottler::spawn(
        broker.clone(),
        Arc::new(RecordingNotifier::new()),
        &config(3),
    );

    let codes: Vec<String> = (0..9).map(|i| format!("S{i}")).collect();
    let pending: Vec<_> = codes
        .iter()
        .map(|code| handle.enqueue(Lane::Normal, subscribe(code)).unwrap())
        .collect();
    for call in pending {
        call.reply().await.unwrap();
    }

    assert_eq!(subscribed_symbols(&broker), codes);
}

#[tokio::test(start_paused = true)]
async fn priority_request_takes_the_next_slot() {
    let (broker, _events) = ScriptedBroker::new();
    let broker = Arc::new(broker);
    let (handle, _task) = GatewayThrottler::spawn(
        broker.clone(),
        Arc::new(RecordingNotifier::new()),
        &config(1),
    );

    let normal: Vec<_> = ["N1", "N2", "N3"]
        .iter()
        .map(|code| handle.enqueue(Lane::Normal, subscribe(code)).unwrap())
        .collect();
    // N1 goes out immediately; N2 is now waiting for the window to reopen.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let urgent = handle.enqueue(Lane::Priority, subscribe("P1")).unwrap();

    urgent.reply().await.unwrap();
    for call in normal {
        call.reply().await.unwrap();
    }

    assert_eq!(subscribed_symbols(&broker), vec!["N1", "P1", "N2", "N3"]);
}

#[tokio::test(start_paused = true)]
async fn slow_broker_call_times_out() {
    let (broker, _events) = ScriptedBroker::new();
    let broker = Arc::new(broker.with_call_latency(Duration::from_secs(5)));
    let (handle, _task) = GatewayThrottler::spawn(
        broker.clone(),
        Arc::new(RecordingNotifier::new()),
        &config(5),
    );

    let result = handle.cancel(Lane::Priority, OrderId::new("X-1")).await;

    assert_eq!(result, Err(ExecutionError::Timeout(Duration::from_secs(2))));
    assert_eq!(broker.cancels().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dispatcher_stops_when_handles_drop() {
    let (broker, _events) = ScriptedBroker::new();
    let (handle, task) = GatewayThrottler::spawn(
        Arc::new(broker),
        Arc::new(RecordingNotifier::new()),
        &config(5),
    );

    handle.subscribe(Symbol::from("S1"), Venue::Nxt).await.unwrap();
    drop(handle);

    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn retry_recovers_from_transient_failures() {
    let attempts = AtomicU32::new(0);
    let policy = RetryPolicy::default();

    let result = policy
        .run("subscribe", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExecutionError::BrokerUnavailable("gateway busy".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

    assert_eq!(result, Ok(2));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn retry_gives_up_after_max_attempts() {
    let attempts = AtomicU32::new(0);
    let policy = RetryPolicy {
        max_attempts: 4,
        ..RetryPolicy::default()
    };

    let result: Result<(), _> = policy
        .run("cancel", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ExecutionError::Timeout(Duration::from_secs(2))) }
        })
        .await;

    assert!(matches!(result, Err(ExecutionError::Timeout(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn venue_reject_is_not_retried() {
    let attempts = AtomicU32::new(0);

    let result: Result<(), _> = RetryPolicy::default()
        .run("submit", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ExecutionError::OrderRejected("halted".into())) }
        })
        .await;

    assert!(matches!(result, Err(ExecutionError::OrderRejected(_))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
