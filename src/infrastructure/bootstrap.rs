//! Composition root: builds the engine and its collaborators from [`Config`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapter::outbound::paper::PaperBroker;
use crate::adapter::outbound::webhook::WebhookNotifier;
use crate::application::detector::SpreadDetector;
use crate::application::execution::{FillRouter, OrderExecutor};
use crate::application::orchestration::{Engine, EngineParts};
use crate::application::risk::RiskManager;
use crate::application::throttle::GatewayThrottler;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;
use crate::port::outbound::broker::{Broker, BrokerEvent};
use crate::port::outbound::notifier::{LogNotifier, Notifier, NotifierRegistry};

/// A fully wired engine plus the handles the caller needs around it.
pub struct Runtime {
    pub engine: Engine,
    /// Fills and connection events from the broker, consumed by the engine.
    pub broker_events: mpsc::UnboundedReceiver<BrokerEvent>,
    pub risk: Arc<RiskManager>,
    /// Dispatcher task of the gateway throttler.
    pub throttler: JoinHandle<()>,
}

/// Build the notifier fan-out: the log always, the webhook when configured.
///
/// # Errors
///
/// Returns an error if the webhook HTTP client cannot be built.
pub fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(LogNotifier));

    match config.notifier.webhook() {
        Some(webhook) => {
            info!(min_severity = webhook.min_severity.as_str(), "Webhook notifier enabled");
            registry.register(Box::new(WebhookNotifier::new(webhook)?));
        }
        None => warn!("No webhook configured, operator alerts go to the log only"),
    }

    Ok(Arc::new(registry))
}

/// Wire the engine around an existing broker session.
///
/// Must be called from within a tokio runtime; the throttler's dispatcher is
/// spawned here.
pub fn build_runtime(
    config: &Config,
    broker: Arc<dyn Broker>,
    broker_events: mpsc::UnboundedReceiver<BrokerEvent>,
    notifier: Arc<dyn Notifier>,
) -> Runtime {
    let fees = config.fee_schedule();
    let risk = Arc::new(RiskManager::new(
        config.risk_limits(),
        fees,
        Arc::clone(&notifier),
    ));
    let detector = Arc::new(SpreadDetector::new(
        config.detector_config(),
        fees,
        Arc::clone(&risk),
        Arc::clone(&notifier),
    ));
    let (throttle, throttler) =
        GatewayThrottler::spawn(broker, Arc::clone(&notifier), &config.throttler_config());
    let router = Arc::new(FillRouter::new());
    let (closing, closing_rx) = watch::channel(false);

    let executor = OrderExecutor::new(
        config.executor_config(),
        Arc::clone(&risk),
        Arc::clone(&detector),
        throttle.clone(),
        Arc::clone(&router),
        Arc::clone(&notifier),
        closing_rx,
    );

    let symbols = config.symbol_infos();
    info!(
        symbols = symbols.len(),
        clip_size = %config.execution.clip_size,
        max_requests_per_sec = config.throttle.max_requests_per_sec,
        "Engine wired"
    );

    let engine = Engine::new(EngineParts {
        detector,
        risk: Arc::clone(&risk),
        executor,
        router,
        throttle,
        notifier,
        closing,
        retry: config.retry_policy(),
        symbols,
    });

    Runtime {
        engine,
        broker_events,
        risk,
        throttler,
    }
}

/// Wire the engine against the paper broker.
///
/// # Errors
///
/// Returns an error if the notifiers cannot be built.
pub fn build_paper_runtime(config: &Config) -> Result<Runtime> {
    let notifier = build_notifier(config)?;
    let (events, broker_events) = mpsc::unbounded_channel();
    let broker: Arc<dyn Broker> = Arc::new(PaperBroker::new(config.broker.latency(), events));
    info!(broker = broker.name(), latency_ms = config.broker.latency_ms, "Broker ready");
    Ok(build_runtime(config, broker, broker_events, notifier))
}
