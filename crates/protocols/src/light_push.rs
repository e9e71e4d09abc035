//! Light push: publish a message through a service peer that relays it on
//! the client's behalf.
//!
//! One stream per push: open, send the request, wait for the response under
//! the request timeout, done.

use std::sync::Arc;

use tracing::{debug, info_span, Instrument, Span};
use waku_message::{Envelope, MessageEncoder, MessageInput};
use waku_network_primitives::stream::{recv, send};
use waku_network_primitives::{PeerStore, StreamControl};
use waku_primitives::{Peer, PeerId, Protocols};

use crate::dispatch::new_request_id;
use crate::peer::{get_peers_for_protocol, select_peer_for_protocol};
use crate::rpc::{PushRequest, PushRpc};
use crate::{ClientOptions, ProtocolError};

/// What the service peer said about a push.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PushOutcome {
    pub is_success: bool,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct LightPushClient {
    peer_store: Arc<dyn PeerStore>,
    streams: Arc<dyn StreamControl>,
    options: ClientOptions,
    span: Span,
}

impl LightPushClient {
    pub fn new(
        peer_store: Arc<dyn PeerStore>,
        streams: Arc<dyn StreamControl>,
        options: ClientOptions,
    ) -> Self {
        Self {
            peer_store,
            streams,
            options,
            span: info_span!("light_push"),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Encodes `message` and hands it to a light push service peer.
    ///
    /// Encoding happens first, so an encoding failure never touches the
    /// network. A negative answer from the peer is returned as an outcome,
    /// not an error.
    pub async fn push(
        &self,
        encoder: &dyn MessageEncoder,
        message: &MessageInput,
        peer_id: Option<PeerId>,
    ) -> Result<PushOutcome, ProtocolError> {
        let envelope = encoder.to_envelope(message)?;

        self.push_envelope(envelope, peer_id)
            .instrument(self.span.clone())
            .await
    }

    async fn push_envelope(
        &self,
        envelope: Envelope,
        peer_id: Option<PeerId>,
    ) -> Result<PushOutcome, ProtocolError> {
        let selected = select_peer_for_protocol(
            &*self.peer_store,
            Protocols::LightPush.codecs(),
            peer_id.as_ref(),
        )
        .await
        .ok_or(ProtocolError::NoPeerAvailable(Protocols::LightPush))?;

        let request_id = new_request_id();

        debug!(
            peer_id = %selected.peer.id,
            %request_id,
            content_topic = %envelope.content_topic,
            "Pushing message"
        );

        let mut stream = self
            .streams
            .open_stream(selected.peer.id, &selected.protocol)
            .await?;

        let request = PushRpc {
            request_id: request_id.clone(),
            request: Some(PushRequest {
                pubsub_topic: self.options.pubsub_topic.clone(),
                message: envelope,
            }),
            response: None,
        };

        send(&mut stream, &request).await?;

        let Some(reply) = recv::<PushRpc>(&mut stream, self.options.request_timeout).await?
        else {
            return Err(ProtocolError::NoResponse);
        };

        if reply.request_id != request_id {
            return Err(ProtocolError::UnexpectedResponse("request id mismatch"));
        }

        let response = reply
            .response
            .ok_or(ProtocolError::UnexpectedResponse("missing push response"))?;

        debug!(%request_id, is_success = response.is_success, "Push answered");

        Ok(PushOutcome {
            is_success: response.is_success,
            error: response.info,
        })
    }

    /// Connected peers offering light push.
    pub async fn peers(&self) -> Vec<Peer> {
        get_peers_for_protocol(&*self.peer_store, Protocols::LightPush.codecs()).await
    }
}

impl core::fmt::Debug for LightPushClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LightPushClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
