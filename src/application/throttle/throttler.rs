//! Gateway request throttler.
//!
//! One dispatcher task owns the broker. Callers enqueue requests on one of two
//! lanes and await the reply; the dispatcher admits each request through the
//! [`RateWindow`], mints the ticket and performs the call, strictly one at a
//! time. Requests are never dropped, only delayed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use super::window::RateWindow;
use crate::domain::id::{OrderId, Symbol};
use crate::domain::venue::Venue;
use crate::error::ExecutionError;
use crate::port::outbound::broker::{
    Broker, BrokerReply, BrokerRequest, OrderRequest, ThrottleTicket,
};
use crate::port::outbound::notifier::{Event, EventKind, Notifier};

/// Queue a request is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// Routine traffic, strictly FIFO.
    Normal,
    /// Unwind traffic (abort cancels and flattens); served ahead of `Normal`.
    Priority,
}

/// Core throttler settings.
#[derive(Debug, Clone)]
pub struct ThrottlerConfig {
    /// Ceiling on broker calls in any one-second span.
    pub max_requests_per_sec: u32,
    /// Upper bound on a single broker call.
    pub call_timeout: Duration,
}

impl Default for ThrottlerConfig {
    fn default() -> Self {
        Self {
            max_requests_per_sec: 5,
            call_timeout: Duration::from_secs(2),
        }
    }
}

type Reply = Result<BrokerReply, ExecutionError>;

struct Job {
    lane: Lane,
    request: BrokerRequest,
    reply: oneshot::Sender<Reply>,
}

/// Cloneable handle used by every component that talks to the broker.
#[derive(Clone)]
pub struct ThrottleHandle {
    normal: mpsc::UnboundedSender<Job>,
    priority: mpsc::UnboundedSender<Job>,
    queued: Arc<AtomicUsize>,
}

/// A request accepted by the throttler, awaiting its turn and its reply.
///
/// Dropping it before dispatch withdraws the request.
pub struct PendingCall {
    rx: oneshot::Receiver<Reply>,
}

impl PendingCall {
    /// Wait for the broker's response.
    pub async fn reply(self) -> Reply {
        self.rx.await.unwrap_or(Err(ExecutionError::ThrottlerClosed))
    }
}

impl ThrottleHandle {
    /// Place a request on a lane.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::ThrottlerClosed`] once the dispatcher has stopped.
    pub fn enqueue(&self, lane: Lane, request: BrokerRequest) -> Result<PendingCall, ExecutionError> {
        let (tx, rx) = oneshot::channel();
        let job = Job {
            lane,
            request,
            reply: tx,
        };
        let sender = match lane {
            Lane::Normal => &self.normal,
            Lane::Priority => &self.priority,
        };
        self.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(ExecutionError::ThrottlerClosed);
        }
        Ok(PendingCall { rx })
    }

    /// Enqueue and wait for the reply.
    pub async fn call(&self, lane: Lane, request: BrokerRequest) -> Reply {
        self.enqueue(lane, request)?.reply().await
    }

    /// Submit an order.
    pub async fn submit(&self, lane: Lane, order: OrderRequest) -> Result<OrderId, ExecutionError> {
        match self.call(lane, BrokerRequest::Submit(order)).await? {
            BrokerReply::Accepted(order_id) => Ok(order_id),
            other => Err(unexpected(&other)),
        }
    }

    /// Cancel a working order.
    pub async fn cancel(&self, lane: Lane, order_id: OrderId) -> Result<(), ExecutionError> {
        match self.call(lane, BrokerRequest::Cancel { order_id }).await? {
            BrokerReply::Canceled => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Subscribe to quotes on one venue.
    pub async fn subscribe(&self, symbol: Symbol, venue: Venue) -> Result<(), ExecutionError> {
        match self
            .call(Lane::Normal, BrokerRequest::Subscribe { symbol, venue })
            .await?
        {
            BrokerReply::Subscribed => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    /// Requests waiting for admission.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

fn unexpected(reply: &BrokerReply) -> ExecutionError {
    ExecutionError::BrokerUnavailable(format!("unexpected broker reply: {reply:?}"))
}

/// The dispatcher task state.
pub struct GatewayThrottler {
    broker: Arc<dyn Broker>,
    notifier: Arc<dyn Notifier>,
    window: RateWindow,
    call_timeout: Duration,
    normal_rx: mpsc::UnboundedReceiver<Job>,
    priority_rx: mpsc::UnboundedReceiver<Job>,
    queued: Arc<AtomicUsize>,
    /// A normal job that lost its admitted slot to a priority job.
    deferred: Option<Job>,
    /// Start of the window in which the last saturation warning was emitted.
    last_warning: Option<Instant>,
}

impl GatewayThrottler {
    /// Start the dispatcher and return the handle callers share.
    ///
    /// The task exits once every handle has been dropped and the queues are drained.
    pub fn spawn(
        broker: Arc<dyn Broker>,
        notifier: Arc<dyn Notifier>,
        config: &ThrottlerConfig,
    ) -> (ThrottleHandle, JoinHandle<()>) {
        let (normal_tx, normal_rx) = mpsc::unbounded_channel();
        let (priority_tx, priority_rx) = mpsc::unbounded_channel();
        let queued = Arc::new(AtomicUsize::new(0));

        let throttler = Self {
            broker,
            notifier,
            window: RateWindow::per_second(config.max_requests_per_sec),
            call_timeout: config.call_timeout,
            normal_rx,
            priority_rx,
            queued: Arc::clone(&queued),
            deferred: None,
            last_warning: None,
        };
        info!(
            broker = throttler.broker.name(),
            max_requests_per_sec = config.max_requests_per_sec,
            "Gateway throttler started"
        );
        let task = tokio::spawn(throttler.run());

        let handle = ThrottleHandle {
            normal: normal_tx,
            priority: priority_tx,
            queued,
        };
        (handle, task)
    }

    async fn run(mut self) {
        while let Some(mut job) = self.next_job().await {
            if job.reply.is_closed() {
                debug!(request = job.request.kind(), "Request withdrawn before dispatch");
                self.queued.fetch_sub(1, Ordering::SeqCst);
                continue;
            }

            let ticket = self.admit().await;

            // Unwind traffic that arrived while we waited for a slot takes it.
            if job.lane == Lane::Normal {
                if let Ok(urgent) = self.priority_rx.try_recv() {
                    self.deferred = Some(job);
                    job = urgent;
                }
            }

            self.queued.fetch_sub(1, Ordering::SeqCst);
            self.execute(ticket, job).await;
        }
        debug!("Gateway throttler stopped");
    }

    /// Next job in service order: priority lane, then the deferred normal
    /// job, then the normal lane.
    async fn next_job(&mut self) -> Option<Job> {
        if let Ok(job) = self.priority_rx.try_recv() {
            return Some(job);
        }
        if let Some(job) = self.deferred.take() {
            return Some(job);
        }
        tokio::select! {
            biased;
            Some(job) = self.priority_rx.recv() => Some(job),
            Some(job) = self.normal_rx.recv() => Some(job),
            else => None,
        }
    }

    async fn admit(&mut self) -> ThrottleTicket {
        loop {
            let now = Instant::now();
            match self.window.try_grant(now) {
                Ok(ticket) => return ticket,
                Err(reopens) => {
                    self.warn_saturated(now);
                    sleep_until(reopens).await;
                }
            }
        }
    }

    fn warn_saturated(&mut self, now: Instant) {
        let period = self.window.period();
        if self
            .last_warning
            .is_some_and(|since| now.duration_since(since) < period)
        {
            return;
        }
        self.last_warning = Some(now);

        let queued = self.queued.load(Ordering::SeqCst);
        warn!(queued, "Broker rate window saturated, deferring requests");
        self.notifier.notify(Event::now(EventKind::RateLimitWarning {
            detail: format!(
                "{} requests/s ceiling reached, deferring",
                self.window.capacity()
            ),
            queued,
        }));
    }

    async fn execute(&self, ticket: ThrottleTicket, job: Job) {
        let kind = job.request.kind();
        debug!(request = kind, lane = ?job.lane, "Dispatching broker call");

        let result = match timeout(self.call_timeout, self.dispatch(ticket, &job.request)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout(self.call_timeout)),
        };
        if let Err(e) = &result {
            debug!(request = kind, error = %e, "Broker call failed");
        }
        // The caller may have gone away; the call still happened exactly once.
        let _ = job.reply.send(result);
    }

    async fn dispatch(&self, ticket: ThrottleTicket, request: &BrokerRequest) -> Reply {
        match request {
            BrokerRequest::Subscribe { symbol, venue } => self
                .broker
                .subscribe(ticket, symbol, *venue)
                .await
                .map(|()| BrokerReply::Subscribed),
            BrokerRequest::Submit(order) => self
                .broker
                .submit_order(ticket, order)
                .await
                .map(BrokerReply::Accepted),
            BrokerRequest::Cancel { order_id } => self
                .broker
                .cancel_order(ticket, order_id)
                .await
                .map(|()| BrokerReply::Canceled),
        }
    }
}
