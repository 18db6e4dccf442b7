//! Dispatch loop: consumes admitted requests, drives the transport, and
//! routes outcomes.
//!
//! One release loop pulls items from the admission receiver; each released
//! item is dispatched as its own task, so the admission *rate* is the only
//! bound; transport calls may overlap when the server is slow.
//!
//! Retry policy: a classified `NotFound` is terminal on first occurrence;
//! every other failure is re-enqueued at the tail of the admission queue
//! (re-competing with fresh traffic under the same rate limit) until the
//! retry ceiling is reached, at which point the last classified error is
//! emitted as the terminal outcome. Retry bookkeeping is an explicit state
//! transition, not recursion, so retry storms cannot grow the stack.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::admission::{AdmissionQueue, AdmissionReceiver};
use crate::error::{ErrorKind, RequestError, TransportError};
use crate::events::{Channel, EventPayload, EventRouter, RequestId, ResponseEvent};
use crate::transport::{ApiRequest, Transport};

/// Locks a mutex, recovering the guard if a panicking task poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// An admitted unit of work. Immutable once enqueued; retries re-enqueue
/// the identical id/channel/request triple.
#[derive(Debug, Clone)]
pub(crate) struct QueuedRequest {
    pub id: RequestId,
    pub channel: Channel,
    pub request: Arc<ApiRequest>,
}

/// Outcome of classifying a transport failure against the retry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Re-enqueue; the value is the attempt number just recorded.
    Retry(u32),
    /// Emit the terminal error event.
    Fail,
}

pub(crate) struct Dispatcher {
    transport: Arc<dyn Transport>,
    router: Arc<Mutex<EventRouter>>,
    retry_counts: Mutex<HashMap<RequestId, u32>>,
    requeue: AdmissionQueue<QueuedRequest>,
    max_retry_count: u32,
}

impl Dispatcher {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        router: Arc<Mutex<EventRouter>>,
        requeue: AdmissionQueue<QueuedRequest>,
        max_retry_count: u32,
    ) -> Self {
        Self {
            transport,
            router,
            retry_counts: Mutex::new(HashMap::new()),
            requeue,
            max_retry_count,
        }
    }

    /// Release loop. Runs until cancelled or until every producer handle
    /// of the admission queue is gone.
    pub(crate) async fn run(
        self: Arc<Self>,
        mut receiver: AdmissionReceiver<QueuedRequest>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                released = receiver.recv() => {
                    let Some(item) = released else { break };
                    let dispatcher = Arc::clone(&self);
                    tokio::spawn(async move { dispatcher.dispatch(item).await });
                }
            }
        }
        debug!("dispatch loop stopped");
    }

    async fn dispatch(&self, item: QueuedRequest) {
        match self.transport.execute(&item.request).await {
            Ok(response) => {
                self.clear_retries(item.id);
                self.emit(ResponseEvent {
                    channel: item.channel,
                    request_id: item.id,
                    payload: EventPayload::Data(Arc::new(response)),
                });
            }
            Err(err) => match self.disposition(item.id, &err) {
                Disposition::Retry(attempt) => {
                    debug!(
                        request_id = %item.id,
                        attempt,
                        max = self.max_retry_count,
                        "re-enqueueing failed request"
                    );
                    if let Err(returned) = self.requeue.enqueue(item) {
                        warn!(
                            request_id = %returned.id,
                            "admission queue closed, dropping retry"
                        );
                    }
                }
                Disposition::Fail => {
                    self.clear_retries(item.id);
                    let error = RequestError::from_transport(err, item.channel.clone(), item.id);
                    warn!(
                        request_id = %item.id,
                        channel = %item.channel,
                        kind = %error.kind,
                        "request failed terminally"
                    );
                    self.emit(ResponseEvent {
                        channel: item.channel,
                        request_id: item.id,
                        payload: EventPayload::Error(Arc::new(error)),
                    });
                }
            },
        }
    }

    fn disposition(&self, id: RequestId, err: &TransportError) -> Disposition {
        let kind = ErrorKind::from_status(err.status);
        let mut counts = lock(&self.retry_counts);
        let attempts = counts.get(&id).copied().unwrap_or(0);
        if !kind.is_retryable() || attempts >= self.max_retry_count {
            Disposition::Fail
        } else {
            counts.insert(id, attempts + 1);
            Disposition::Retry(attempts + 1)
        }
    }

    /// Prunes the retry entry on terminal outcome so the map stays
    /// bounded by the number of in-flight requests.
    fn clear_retries(&self, id: RequestId) {
        lock(&self.retry_counts).remove(&id);
    }

    fn emit(&self, event: ResponseEvent) {
        lock(&self.router).emit(&event);
    }
}
