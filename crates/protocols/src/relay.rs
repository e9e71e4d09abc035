//! Relay: publish to and observe the pub/sub mesh on one pub/sub topic.
//!
//! Observers pair a decoder with a callback. Each inbound message is offered
//! to every observer bound to its content topic, in registration order, and
//! each observer decodes it independently. A decoder that rejects the
//! message, or a callback that panics, affects only its own observer.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, trace, warn, Instrument, Span};
use waku_message::{Envelope, Message, MessageDecoder, MessageEncoder, MessageInput};
use waku_network_primitives::{NetworkEvent, NetworkEvents, PubSub};
use waku_primitives::{PeerId, PubSubTopic};

use crate::dispatch::{invoke, Callback};
use crate::ProtocolError;

#[derive(Clone)]
struct Observer {
    decoder: Arc<dyn MessageDecoder>,
    callback: Callback,
}

struct RelayState {
    pubsub: Arc<dyn PubSub>,
    pubsub_topic: PubSubTopic,
    observers: RwLock<BTreeMap<u64, Observer>>,
    next_observer: AtomicU64,
}

#[derive(Clone)]
pub struct RelayClient {
    state: Arc<RelayState>,
    events: Arc<dyn NetworkEvents>,
    emit_self: bool,
    span: Span,
}

impl RelayClient {
    pub fn new(
        pubsub: Arc<dyn PubSub>,
        events: Arc<dyn NetworkEvents>,
        pubsub_topic: PubSubTopic,
    ) -> Self {
        Self {
            state: Arc::new(RelayState {
                pubsub,
                pubsub_topic,
                observers: RwLock::default(),
                next_observer: AtomicU64::new(0),
            }),
            events,
            emit_self: false,
            span: info_span!("relay"),
        }
    }

    /// Also deliver this node's own publications to its observers.
    #[must_use]
    pub const fn with_emit_self(mut self, emit_self: bool) -> Self {
        self.emit_self = emit_self;
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn pubsub_topic(&self) -> &PubSubTopic {
        &self.state.pubsub_topic
    }

    /// Joins the topic and starts feeding inbound messages to observers.
    ///
    /// The returned task ends when the substrate's event feed closes.
    pub async fn start(&self) -> Result<JoinHandle<()>, ProtocolError> {
        // Subscribe to events first so nothing published right after joining
        // the topic is missed.
        let mut events = self.events.events();

        self.state.pubsub.subscribe(&self.state.pubsub_topic).await?;

        info!(parent: &self.span, topic = %self.state.pubsub_topic, "Joined relay topic");

        let state = Arc::clone(&self.state);
        let local_peer_id = self.state.pubsub.local_peer_id();

        let task = async move {
            loop {
                match events.recv().await {
                    Ok(NetworkEvent::Message {
                        source,
                        topic,
                        data,
                    }) if topic == state.pubsub_topic => {
                        // Own publications are echoed in `send` when enabled.
                        if source == Some(local_peer_id) {
                            continue;
                        }

                        state.dispatch(source, &data);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Relay fell behind the network event feed");
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            debug!("Relay event loop stopped");
        };

        Ok(tokio::spawn(task.instrument(self.span.clone())))
    }

    /// Leaves the topic. Observers stay registered.
    pub async fn stop(&self) -> Result<(), ProtocolError> {
        self.state.pubsub.unsubscribe(&self.state.pubsub_topic).await?;

        Ok(())
    }

    /// Encodes `message` and publishes it on the relay topic.
    ///
    /// Fails before any network I/O when encoding fails. Publishing with no
    /// subscribed peers is reported by the substrate.
    pub async fn send(
        &self,
        encoder: &dyn MessageEncoder,
        message: &MessageInput,
    ) -> Result<(), ProtocolError> {
        let data = Bytes::from(encoder.to_wire(message)?);

        debug!(
            parent: &self.span,
            content_topic = %encoder.content_topic(),
            size = data.len(),
            "Publishing message"
        );

        self.publish(data).instrument(self.span.clone()).await
    }

    async fn publish(&self, data: Bytes) -> Result<(), ProtocolError> {
        self.state
            .pubsub
            .publish(&self.state.pubsub_topic, data.clone())
            .await?;

        if self.emit_self {
            self.state
                .dispatch(Some(self.state.pubsub.local_peer_id()), &data);
        }

        Ok(())
    }

    /// Registers `callback` for messages `decoder` accepts.
    ///
    /// Dropping the handle keeps the observer. Call
    /// [`ObserverHandle::remove`] to unregister.
    pub fn add_observer<F>(&self, decoder: Arc<dyn MessageDecoder>, callback: F) -> ObserverHandle
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let id = self.state.next_observer.fetch_add(1, Ordering::Relaxed);

        let _replaced = self.state.observers.write().insert(
            id,
            Observer {
                decoder,
                callback: Arc::new(callback),
            },
        );

        ObserverHandle {
            state: Arc::downgrade(&self.state),
            id,
        }
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.observers.read().len()
    }

    /// Peers in this node's mesh for the relay topic.
    pub async fn mesh_peers(&self) -> Vec<PeerId> {
        self.state.pubsub.subscribers(&self.state.pubsub_topic).await
    }

    /// Feeds one raw message to the observers, as if it arrived from
    /// `source`.
    pub fn dispatch(&self, source: Option<PeerId>, data: &[u8]) {
        let _entered = self.span.enter();

        self.state.dispatch(source, data);
    }
}

impl core::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RelayClient")
            .field("pubsub_topic", &self.state.pubsub_topic)
            .field("emit_self", &self.emit_self)
            .field("observers", &self.observer_count())
            .finish_non_exhaustive()
    }
}

impl RelayState {
    fn dispatch(&self, source: Option<PeerId>, data: &[u8]) {
        let envelope = match Envelope::from_bytes(data) {
            Ok(envelope) => envelope,
            Err(err) => {
                debug!(?source, %err, "Dropping undecodable relay message");
                return;
            }
        };

        let observers: Vec<_> = self
            .observers
            .read()
            .values()
            .filter(|observer| observer.decoder.content_topic() == &envelope.content_topic)
            .cloned()
            .collect();

        if observers.is_empty() {
            trace!(content_topic = %envelope.content_topic, "No observer for content topic");
            return;
        }

        for observer in &observers {
            match observer.decoder.decode(&envelope) {
                Ok(message) => invoke(&observer.callback, message),
                Err(err) => {
                    debug!(content_topic = %envelope.content_topic, %err, "Observer rejected message");
                }
            }
        }
    }
}

/// Unregisters an observer. Removing twice is a no-op.
#[derive(Clone, Debug)]
pub struct ObserverHandle {
    state: Weak<RelayState>,
    id: u64,
}

impl ObserverHandle {
    pub fn remove(&self) {
        if let Some(state) = self.state.upgrade() {
            let _removed = state.observers.write().remove(&self.id);
        }
    }
}
