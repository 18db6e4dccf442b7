//! The request manager facade.
//!
//! [`RequestManager`] owns the admission queue, the dispatch loop, and the
//! event router, and exposes three ways to submit work:
//!
//! - [`request`](RequestManager::request): one call, one awaited outcome.
//!   Plumbed through an ephemeral channel torn down on completion.
//! - [`request_bulk`](RequestManager::request_bulk): a batch awaited as a
//!   unit, outcomes reported in submission order regardless of completion
//!   order.
//! - [`request_stream`](RequestManager::request_stream): fire-and-forget
//!   against a caller-registered listener channel; outcomes arrive as
//!   events.
//!
//! All three share the same admission rate and retry policy. Listener
//! callbacks run synchronously while the router is locked, so a callback
//! must never call back into listener registration or teardown; hand work
//! off through a channel instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::admission::{admission_queue, AdmissionConfig, AdmissionQueue};
use crate::config::ManagerConfig;
use crate::dispatcher::{lock, Dispatcher, QueuedRequest};
use crate::error::{Error, RequestError, Result};
use crate::events::{Channel, EventKind, EventPayload, EventRouter, ListenerBinding, RequestId};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

/// Per-item outcome of a bulk submission.
#[derive(Debug, Clone)]
pub enum BulkOutcome {
    /// The item completed with a successful response.
    Data(Arc<ApiResponse>),
    /// The item reached a terminal, classified failure.
    Error(Arc<RequestError>),
}

impl BulkOutcome {
    /// Whether this item failed.
    #[must_use]
    pub fn is_err(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The successful response, if any.
    #[must_use]
    pub fn as_data(&self) -> Option<&Arc<ApiResponse>> {
        match self {
            Self::Data(response) => Some(response),
            Self::Error(_) => None,
        }
    }

    /// The classified error, if any.
    #[must_use]
    pub fn as_error(&self) -> Option<&Arc<RequestError>> {
        match self {
            Self::Data(_) => None,
            Self::Error(err) => Some(err),
        }
    }
}

/// Bookkeeping for one in-flight bulk submission.
struct BulkState {
    outcomes: HashMap<RequestId, BulkOutcome>,
    expected: usize,
    done: Option<oneshot::Sender<()>>,
}

impl BulkState {
    fn record(&mut self, id: RequestId, outcome: BulkOutcome) {
        self.outcomes.insert(id, outcome);
        if self.outcomes.len() == self.expected {
            if let Some(done) = self.done.take() {
                let _ = done.send(());
            }
        }
    }
}

/// Client-side HTTP request manager: rate-limited admission, transparent
/// retries, and event-based outcome delivery.
///
/// Dropping the manager cancels its dispatch loop; outcomes for requests
/// still in flight are never delivered after that point.
pub struct RequestManager {
    queue: AdmissionQueue<QueuedRequest>,
    router: Arc<Mutex<EventRouter>>,
    shutdown: CancellationToken,
}

impl RequestManager {
    /// Creates a manager backed by the HTTP transport.
    ///
    /// Must be called within a Tokio runtime: the dispatch loop is spawned
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the configuration fails
    /// validation or the HTTP client cannot be built.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(&config, transport))
    }

    /// Creates a manager over an arbitrary transport. Used by tests and by
    /// callers that bring their own transport stack; no endpoint
    /// validation is performed.
    pub fn with_transport(config: &ManagerConfig, transport: Arc<dyn Transport>) -> Self {
        let (queue, receiver) =
            admission_queue(AdmissionConfig::new(config.burst_size, config.period));
        let router = Arc::new(Mutex::new(EventRouter::new()));
        let dispatcher = Arc::new(Dispatcher::new(
            transport,
            Arc::clone(&router),
            queue.clone(),
            config.max_retry_count,
        ));
        let shutdown = CancellationToken::new();
        tokio::spawn(dispatcher.run(receiver, shutdown.clone()));
        debug!(
            burst_size = config.burst_size,
            period_ms = config.period.as_millis() as u64,
            max_retry_count = config.max_retry_count,
            "request manager started"
        );
        Self {
            queue,
            router,
            shutdown,
        }
    }

    /// Registers a listener for an event kind.
    ///
    /// Bindings default to the shared stream channel; use
    /// [`ListenerBinding::on_channel`] to listen elsewhere.
    pub fn on(&self, kind: EventKind, binding: ListenerBinding) {
        lock(&self.router).on(kind, binding);
    }

    /// Removes every listener bound to a channel. Idempotent.
    pub fn remove_all_listeners_for_channel(&self, channel: &Channel) {
        lock(&self.router).remove_channel(channel);
    }

    /// Submits a request and awaits its single terminal outcome.
    ///
    /// The request is admitted under the shared rate limit and retried per
    /// the retry policy; only the terminal outcome is observable here.
    ///
    /// # Errors
    ///
    /// Returns the classified [`RequestError`](Error::Request) on terminal
    /// failure, or [`Error::Shutdown`] if the manager stops before an
    /// outcome arrives.
    #[instrument(skip(self, request), fields(verb = %request.verb, url = %request.url))]
    pub async fn request(&self, request: ApiRequest) -> Result<Arc<ApiResponse>> {
        let channel = Channel::ephemeral();
        let id = RequestId::new();
        let (tx, rx) = oneshot::channel();
        // Shared between the data and error listeners; whichever fires
        // first takes the sender.
        let slot = Arc::new(Mutex::new(Some(tx)));

        let data_slot = Arc::clone(&slot);
        self.on(
            EventKind::Data,
            ListenerBinding::new(move |event_id, payload| {
                if event_id != id {
                    return;
                }
                if let EventPayload::Data(response) = payload {
                    if let Some(tx) = lock(&data_slot).take() {
                        let _ = tx.send(Ok(Arc::clone(response)));
                    }
                }
            })
            .on_channel(channel.clone()),
        );
        self.on(
            EventKind::Error,
            ListenerBinding::new(move |event_id, payload| {
                if event_id != id {
                    return;
                }
                if let EventPayload::Error(err) = payload {
                    if let Some(tx) = lock(&slot).take() {
                        let _ = tx.send(Err(Error::from(Arc::clone(err))));
                    }
                }
            })
            .on_channel(channel.clone()),
        );

        let outcome = match self.submit(request, channel.clone(), id) {
            Ok(()) => rx.await.unwrap_or_else(|_| {
                Err(Error::shutdown("dispatch loop stopped before a response arrived"))
            }),
            Err(err) => Err(err),
        };
        // Teardown happens here, never inside a callback.
        self.remove_all_listeners_for_channel(&channel);
        outcome
    }

    /// Submits a batch and awaits all terminal outcomes.
    ///
    /// Items are admitted in order under the shared rate limit and may
    /// complete out of order; results are reassembled in submission order.
    /// An empty batch resolves immediately.
    ///
    /// # Errors
    ///
    /// If every item succeeds, returns the responses in submission order.
    /// If any item fails, returns [`Error::Bulk`] carrying every per-item
    /// outcome in submission order.
    #[instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn request_bulk(&self, requests: Vec<ApiRequest>) -> Result<Vec<Arc<ApiResponse>>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let channel = Channel::ephemeral();
        let ids: Vec<RequestId> = requests.iter().map(|_| RequestId::new()).collect();
        let (done_tx, done_rx) = oneshot::channel();
        let state = Arc::new(Mutex::new(BulkState {
            outcomes: HashMap::with_capacity(requests.len()),
            expected: requests.len(),
            done: Some(done_tx),
        }));

        let data_state = Arc::clone(&state);
        self.on(
            EventKind::Data,
            ListenerBinding::new(move |id, payload| {
                if let EventPayload::Data(response) = payload {
                    lock(&data_state).record(id, BulkOutcome::Data(Arc::clone(response)));
                }
            })
            .on_channel(channel.clone()),
        );
        let error_state = Arc::clone(&state);
        self.on(
            EventKind::Error,
            ListenerBinding::new(move |id, payload| {
                if let EventPayload::Error(err) = payload {
                    lock(&error_state).record(id, BulkOutcome::Error(Arc::clone(err)));
                }
            })
            .on_channel(channel.clone()),
        );

        for (id, request) in ids.iter().zip(requests) {
            if let Err(err) = self.submit(request, channel.clone(), *id) {
                self.remove_all_listeners_for_channel(&channel);
                return Err(err);
            }
        }

        let completed = done_rx.await;
        self.remove_all_listeners_for_channel(&channel);
        if completed.is_err() {
            return Err(Error::shutdown(
                "dispatch loop stopped before the batch completed",
            ));
        }

        let mut recorded = lock(&state);
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in &ids {
            let outcome = recorded
                .outcomes
                .remove(id)
                .ok_or_else(|| Error::shutdown("bulk outcome missing after completion"))?;
            outcomes.push(outcome);
        }
        drop(recorded);

        if outcomes.iter().any(BulkOutcome::is_err) {
            return Err(Error::Bulk(outcomes));
        }
        let mut responses = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                BulkOutcome::Data(response) => responses.push(response),
                BulkOutcome::Error(err) => return Err(Error::from(err)),
            }
        }
        Ok(responses)
    }

    /// Submits a request whose outcome is delivered as an event on
    /// `channel` (the shared stream channel when `None`).
    ///
    /// Fails fast, before anything is enqueued, if no data listener is
    /// registered for the channel: without one the outcome could never be
    /// observed.
    ///
    /// # Errors
    ///
    /// [`Error::MissingListener`] when the channel has no data listener;
    /// [`Error::Shutdown`] when the manager has stopped.
    pub fn request_stream(
        &self,
        request: ApiRequest,
        channel: Option<Channel>,
    ) -> Result<RequestId> {
        let channel = channel.unwrap_or_else(Channel::stream);
        if !lock(&self.router).has_listeners(&channel) {
            return Err(Error::missing_listener(channel));
        }
        let id = RequestId::new();
        self.submit(request, channel, id)?;
        Ok(id)
    }

    fn submit(&self, request: ApiRequest, channel: Channel, id: RequestId) -> Result<()> {
        self.queue
            .enqueue(QueuedRequest {
                id,
                channel,
                request: Arc::new(request),
            })
            .map_err(|_| Error::shutdown("admission queue closed"))
    }
}

impl Drop for RequestManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
