//! Filter: ask a service peer to push messages for a set of content topics.
//!
//! Subscribing sends one request carrying every decoder's content topic. The
//! service peer later opens its own streams to push matching messages, tagged
//! with the subscription's request id. [`FilterClient::start`] must be running
//! for those pushes to be delivered.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::select_all;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument, Span};
use waku_message::{Message, MessageDecoder};
use waku_network_primitives::stream::{send, Stream};
use waku_network_primitives::{PeerStore, StreamControl};
use waku_primitives::{Peer, PeerId, Protocols, PubSubTopic};

use crate::dispatch::{decode_first, invoke, new_request_id, Callback};
use crate::peer::{get_peers_for_protocol, select_peer_for_protocol, SelectedPeer};
use crate::rpc::{ContentFilter, FilterRequest, FilterRpc, MessagePush};
use crate::{ClientOptions, ProtocolError};

#[derive(Clone)]
struct ActiveSubscription {
    peer_id: PeerId,
    decoders: Vec<Arc<dyn MessageDecoder>>,
    callback: Callback,
}

struct FilterState {
    peer_store: Arc<dyn PeerStore>,
    streams: Arc<dyn StreamControl>,
    options: ClientOptions,
    subscriptions: Mutex<HashMap<String, ActiveSubscription>>,
}

#[derive(Clone)]
pub struct FilterClient {
    state: Arc<FilterState>,
    span: Span,
}

impl FilterClient {
    pub fn new(
        peer_store: Arc<dyn PeerStore>,
        streams: Arc<dyn StreamControl>,
        options: ClientOptions,
    ) -> Self {
        Self {
            state: Arc::new(FilterState {
                peer_store,
                streams,
                options,
                subscriptions: Mutex::default(),
            }),
            span: info_span!("filter"),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Starts accepting pushes. Runs until the substrate stops handing out
    /// inbound streams or the returned task is aborted.
    pub async fn start(&self) -> Result<JoinHandle<()>, ProtocolError> {
        let mut listeners = Vec::with_capacity(Protocols::Filter.codecs().len());
        for codec in Protocols::Filter.codecs() {
            listeners.push(self.state.streams.accept(codec).await?);
        }

        let mut incoming = select_all(listeners);
        let state = Arc::clone(&self.state);

        let task = async move {
            while let Some((peer_id, stream)) = incoming.next().await {
                let state = Arc::clone(&state);

                drop(tokio::spawn(
                    async move { state.handle_stream(peer_id, stream).await }.in_current_span(),
                ));
            }

            debug!("Filter push listener closed");
        };

        Ok(tokio::spawn(task.instrument(self.span.clone())))
    }

    /// Subscribes `callback` to every content topic of `decoders`.
    ///
    /// Pushed messages are decoded with the first matching decoder that
    /// accepts them. Only pushes from the peer that took the subscription are
    /// delivered.
    pub async fn subscribe<F>(
        &self,
        decoders: Vec<Arc<dyn MessageDecoder>>,
        callback: F,
        peer_id: Option<PeerId>,
    ) -> Result<Subscription, ProtocolError>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.register(decoders, Arc::new(callback), peer_id)
            .instrument(self.span.clone())
            .await
    }

    async fn register(
        &self,
        decoders: Vec<Arc<dyn MessageDecoder>>,
        callback: Callback,
        peer_id: Option<PeerId>,
    ) -> Result<Subscription, ProtocolError> {
        let peer = select_peer_for_protocol(
            &*self.state.peer_store,
            Protocols::Filter.codecs(),
            peer_id.as_ref(),
        )
        .await
        .ok_or(ProtocolError::NoPeerAvailable(Protocols::Filter))?;

        let mut content_filters = Vec::with_capacity(decoders.len());
        for decoder in &decoders {
            let filter = ContentFilter {
                content_topic: decoder.content_topic().clone(),
            };
            if !content_filters.contains(&filter) {
                content_filters.push(filter);
            }
        }

        let request_id = new_request_id();
        let pubsub_topic = self.state.options.pubsub_topic.clone();

        // Registered before the request goes out: the first push can
        // race the request's completion.
        let _replaced = self.state.subscriptions.lock().insert(
            request_id.clone(),
            ActiveSubscription {
                peer_id: peer.peer.id,
                decoders,
                callback,
            },
        );

        let request = FilterRequest {
            subscribe: true,
            pubsub_topic: pubsub_topic.clone(),
            content_filters: content_filters.clone(),
        };

        if let Err(err) = self.state.send_request(&peer, &request_id, request).await {
            let _removed = self.state.subscriptions.lock().remove(&request_id);
            return Err(err);
        }

        info!(
            peer_id = %peer.peer.id,
            %request_id,
            topics = content_filters.len(),
            "Filter subscription active"
        );

        Ok(Subscription {
            state: Arc::clone(&self.state),
            span: self.span.clone(),
            request_id,
            peer,
            pubsub_topic,
            content_filters,
        })
    }

    /// Drops every local subscription without notifying service peers.
    pub fn clear_subscriptions(&self) {
        self.state.subscriptions.lock().clear();
    }

    /// Number of subscriptions currently receiving pushes.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.state.subscriptions.lock().len()
    }

    /// Connected peers offering filter.
    pub async fn peers(&self) -> Vec<Peer> {
        get_peers_for_protocol(&*self.state.peer_store, Protocols::Filter.codecs()).await
    }
}

impl core::fmt::Debug for FilterClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FilterClient")
            .field("options", &self.state.options)
            .field("subscriptions", &self.active_subscriptions())
            .finish_non_exhaustive()
    }
}

impl FilterState {
    async fn send_request(
        &self,
        peer: &SelectedPeer,
        request_id: &str,
        request: FilterRequest,
    ) -> Result<(), ProtocolError> {
        let mut stream = self.streams.open_stream(peer.peer.id, &peer.protocol).await?;

        let rpc = FilterRpc {
            request_id: request_id.to_owned(),
            request: Some(request),
            push: None,
        };

        send(&mut stream, &rpc).await?;
        stream.close().await?;

        Ok(())
    }

    async fn handle_stream(&self, peer_id: PeerId, mut stream: Stream) {
        while let Some(frame) = stream.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(%peer_id, %err, "Filter push stream failed");
                    return;
                }
            };

            let rpc: FilterRpc = match borsh::from_slice(&frame) {
                Ok(rpc) => rpc,
                Err(err) => {
                    warn!(%peer_id, %err, "Discarding malformed filter frame");
                    return;
                }
            };

            match rpc.push {
                Some(push) => self.deliver(peer_id, &rpc.request_id, &push),
                None => debug!(%peer_id, "Ignoring filter frame without a push"),
            }
        }
    }

    fn deliver(&self, peer_id: PeerId, request_id: &str, push: &MessagePush) {
        let Some(subscription) = self.subscriptions.lock().get(request_id).cloned() else {
            debug!(%peer_id, %request_id, "Push for unknown subscription");
            return;
        };

        if subscription.peer_id != peer_id {
            warn!(
                %peer_id,
                expected = %subscription.peer_id,
                %request_id,
                "Dropping push from a peer that does not hold the subscription"
            );
            return;
        }

        for envelope in &push.messages {
            if let Some(message) = decode_first(&subscription.decoders, envelope) {
                invoke(&subscription.callback, message);
            }
        }
    }
}

/// A live filter subscription.
pub struct Subscription {
    state: Arc<FilterState>,
    span: Span,
    request_id: String,
    peer: SelectedPeer,
    pubsub_topic: PubSubTopic,
    content_filters: Vec<ContentFilter>,
}

impl Subscription {
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub const fn peer_id(&self) -> PeerId {
        self.peer.peer.id
    }

    /// Stops delivery, then asks the service peer to stop pushing.
    ///
    /// Local delivery ends even when the request to the peer fails.
    pub async fn unsubscribe(self) -> Result<(), ProtocolError> {
        let _removed = self.state.subscriptions.lock().remove(&self.request_id);

        let request = FilterRequest {
            subscribe: false,
            pubsub_topic: self.pubsub_topic,
            content_filters: self.content_filters,
        };

        debug!(request_id = %self.request_id, peer_id = %self.peer.peer.id, "Unsubscribing");

        self.state
            .send_request(&self.peer, &new_request_id(), request)
            .instrument(self.span)
            .await
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("request_id", &self.request_id)
            .field("peer", &self.peer)
            .field("content_filters", &self.content_filters)
            .finish_non_exhaustive()
    }
}
