//! Event routing between the dispatch loop and callers.
//!
//! Responses are produced asynchronously, out of band from submission, so
//! they are delivered through a publish/subscribe registry keyed by event
//! kind and *channel*. A channel is a routing key, not a network concept:
//! either the shared [`Channel::stream`] default (caller-managed lifetime)
//! or a freshly generated value owned by a single in-flight call and torn
//! down the moment that call completes.
//!
//! The registry is a fixed-shape map from the closed [`EventKind`] enum to
//! binding lists, initialized eagerly at construction, so emitting to an
//! unknown event kind is impossible by construction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RequestError;
use crate::transport::ApiResponse;

/// Name of the shared, caller-managed default channel.
pub const STREAM_CHANNEL: &str = "stream";

/// Identifier of a logical request, stable across its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh id.
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A routing key partitioning event delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel(String);

impl Channel {
    /// The shared default channel, distinct from ephemeral per-call
    /// channels.
    #[must_use]
    pub fn stream() -> Self {
        Self(STREAM_CHANNEL.to_string())
    }

    /// Generates a unique channel owned by a single in-flight call.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the channel name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Channel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Channel {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The closed set of event kinds the router delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A successful response.
    Data,
    /// A terminal, classified failure.
    Error,
}

impl EventKind {
    const ALL: [EventKind; 2] = [EventKind::Data, EventKind::Error];
}

/// Payload delivered to listeners. `Arc`-shared so every listener on a
/// channel observes the same event without copying the body.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// Successful response body.
    Data(Arc<ApiResponse>),
    /// Terminal classified error.
    Error(Arc<RequestError>),
}

impl EventPayload {
    /// The event kind this payload is delivered under.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Data(_) => EventKind::Data,
            Self::Error(_) => EventKind::Error,
        }
    }
}

/// A routed response event.
#[derive(Debug, Clone)]
pub(crate) struct ResponseEvent {
    pub channel: Channel,
    pub request_id: RequestId,
    pub payload: EventPayload,
}

/// Callback invoked for every matching event.
///
/// Invoked synchronously with respect to the emitting call, so callbacks
/// must not block; hand work off through a channel if needed.
pub type ListenerCallback = Box<dyn Fn(RequestId, &EventPayload) + Send + Sync + 'static>;

/// A listener registration: a callback bound to one channel.
pub struct ListenerBinding {
    channel: Channel,
    callback: ListenerCallback,
}

impl ListenerBinding {
    /// Creates a binding on the shared default channel.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(RequestId, &EventPayload) + Send + Sync + 'static,
    {
        Self {
            channel: Channel::stream(),
            callback: Box::new(callback),
        }
    }

    /// Binds the listener to a specific channel instead of the default.
    #[must_use]
    pub fn on_channel(mut self, channel: impl Into<Channel>) -> Self {
        self.channel = channel.into();
        self
    }

    /// The channel this binding listens on.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

impl fmt::Debug for ListenerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Publish/subscribe registry keyed by event kind and channel.
///
/// Delivery order among bindings on the same channel is registration
/// order; delivery is synchronous with respect to `emit`. The router never
/// cross-delivers between channels.
#[derive(Debug)]
pub(crate) struct EventRouter {
    bindings: HashMap<EventKind, Vec<ListenerBinding>>,
}

impl EventRouter {
    /// Creates a router with both event kinds pre-registered.
    pub(crate) fn new() -> Self {
        let mut bindings = HashMap::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            bindings.insert(kind, Vec::new());
        }
        Self { bindings }
    }

    /// Registers a binding for an event kind.
    pub(crate) fn on(&mut self, kind: EventKind, binding: ListenerBinding) {
        self.bindings
            .entry(kind)
            .or_default()
            .push(binding);
    }

    /// Delivers an event to every binding registered on its channel, in
    /// registration order.
    pub(crate) fn emit(&self, event: &ResponseEvent) {
        let kind = event.payload.kind();
        let Some(listeners) = self.bindings.get(&kind) else {
            // Both kinds are registered at construction.
            unreachable!("event kind {kind:?} missing from router");
        };
        for binding in listeners {
            if binding.channel == event.channel {
                (binding.callback)(event.request_id, &event.payload);
            }
        }
    }

    /// Removes every binding for a channel across all event kinds.
    /// Idempotent: removing an absent channel is a no-op.
    pub(crate) fn remove_channel(&mut self, channel: &Channel) {
        for listeners in self.bindings.values_mut() {
            listeners.retain(|binding| &binding.channel != channel);
        }
    }

    /// Whether any data listener is registered for a channel.
    pub(crate) fn has_listeners(&self, channel: &Channel) -> bool {
        self.bindings
            .get(&EventKind::Data)
            .is_some_and(|listeners| listeners.iter().any(|b| &b.channel == channel))
    }

    #[cfg(test)]
    fn binding_count(&self, kind: EventKind) -> usize {
        self.bindings.get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn data_event(channel: &Channel, id: RequestId) -> ResponseEvent {
        ResponseEvent {
            channel: channel.clone(),
            request_id: id,
            payload: EventPayload::Data(Arc::new(ApiResponse {
                status: 200,
                data: json!({"ok": true}),
                headers: json!({}),
            })),
        }
    }

    #[test]
    fn test_default_channel_is_stream() {
        let binding = ListenerBinding::new(|_, _| {});
        assert_eq!(binding.channel(), &Channel::stream());
    }

    #[test]
    fn test_emit_delivers_only_to_matching_channel() {
        let mut router = EventRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counted = hits.clone();
        router.on(
            EventKind::Data,
            ListenerBinding::new(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .on_channel("a"),
        );
        router.on(EventKind::Data, ListenerBinding::new(|_, _| {}).on_channel("b"));

        router.emit(&data_event(&Channel::from("a"), RequestId::new()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        router.emit(&data_event(&Channel::from("b"), RequestId::new()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_preserves_registration_order() {
        let mut router = EventRouter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            router.on(
                EventKind::Data,
                ListenerBinding::new(move |_, _| {
                    order.lock().unwrap().push(tag);
                })
                .on_channel("c"),
            );
        }

        router.emit(&data_event(&Channel::from("c"), RequestId::new()));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_remove_channel_is_idempotent() {
        let mut router = EventRouter::new();
        let channel = Channel::from("teardown");
        router.on(
            EventKind::Data,
            ListenerBinding::new(|_, _| {}).on_channel(channel.clone()),
        );
        router.on(
            EventKind::Error,
            ListenerBinding::new(|_, _| {}).on_channel(channel.clone()),
        );

        router.remove_channel(&channel);
        router.remove_channel(&channel);

        assert_eq!(router.binding_count(EventKind::Data), 0);
        assert_eq!(router.binding_count(EventKind::Error), 0);
        assert!(!router.has_listeners(&channel));
    }

    #[test]
    fn test_remove_channel_keeps_other_channels() {
        let mut router = EventRouter::new();
        router.on(EventKind::Data, ListenerBinding::new(|_, _| {}).on_channel("keep"));
        router.on(EventKind::Data, ListenerBinding::new(|_, _| {}).on_channel("drop"));

        router.remove_channel(&Channel::from("drop"));

        assert!(router.has_listeners(&Channel::from("keep")));
        assert!(!router.has_listeners(&Channel::from("drop")));
    }

    #[test]
    fn test_has_listeners_checks_data_kind() {
        let mut router = EventRouter::new();
        router.on(EventKind::Error, ListenerBinding::new(|_, _| {}).on_channel("errs"));
        // An error-only registration does not make a channel consumable.
        assert!(!router.has_listeners(&Channel::from("errs")));
    }
}
