//! Full engine wired to a [`ScriptedBroker`] and a [`RecordingNotifier`].

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::broker::ScriptedBroker;
use super::domain::{quote, SYMBOL};
use super::notifier::RecordingNotifier;
use crate::application::orchestration::{EngineInput, EngineSummary};
use crate::application::risk::RiskManager;
use crate::domain::venue::Venue;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::settings::Config;
use crate::port::inbound::session::SessionSignal;
use crate::port::outbound::broker::BrokerEvent;
use crate::port::outbound::notifier::Notifier;

/// A running engine plus the doubles around it.
pub struct EngineHarness {
    pub broker: Arc<ScriptedBroker>,
    pub notifier: Arc<RecordingNotifier>,
    pub risk: Arc<RiskManager>,
    inputs: mpsc::Sender<EngineInput>,
    engine: JoinHandle<EngineSummary>,
}

impl EngineHarness {
    /// Build the engine from `config` and start its loop.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(
        config: &Config,
        broker: ScriptedBroker,
        broker_events: mpsc::UnboundedReceiver<BrokerEvent>,
    ) -> Self {
        let broker = Arc::new(broker);
        let notifier = Arc::new(RecordingNotifier::new());
        let runtime = bootstrap::build_runtime(
            config,
            broker.clone(),
            broker_events,
            notifier.clone() as Arc<dyn Notifier>,
        );
        let (inputs, feed) = mpsc::channel(256);
        let engine = tokio::spawn(runtime.engine.run(feed, runtime.broker_events));
        Self {
            broker,
            notifier,
            risk: runtime.risk,
            inputs,
            engine,
        }
    }

    /// # Panics
    ///
    /// Panics if the engine loop has stopped.
    pub async fn send(&self, input: EngineInput) {
        self.inputs.send(input).await.expect("engine running");
    }

    pub async fn open(&self) {
        self.send(EngineInput::Session(SessionSignal::Open)).await;
    }

    pub async fn signal(&self, signal: SessionSignal) {
        self.send(EngineInput::Session(signal)).await;
    }

    /// Quote the default test symbol.
    pub async fn quote(&self, venue: Venue, bid: Decimal, ask: Decimal) {
        self.quote_symbol(SYMBOL, venue, bid, ask).await;
    }

    pub async fn quote_symbol(&self, symbol: &str, venue: Venue, bid: Decimal, ask: Decimal) {
        self.send(EngineInput::Quote(quote(symbol, venue, bid, ask))).await;
    }

    /// Wait (in virtual time) until the broker has seen `n` orders.
    ///
    /// # Panics
    ///
    /// Panics if that does not happen within a minute of virtual time.
    pub async fn wait_for_orders(&self, n: usize) {
        for _ in 0..60_000 {
            if self.broker.orders().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!(
            "expected {n} orders, broker saw {}",
            self.broker.orders().len()
        );
    }

    /// Close the feed and wait for every session to finish.
    ///
    /// # Panics
    ///
    /// Panics if the engine task panicked.
    pub async fn finish(self) -> EngineSummary {
        drop(self.inputs);
        self.engine.await.expect("engine task")
    }
}
