//! Client sides of the Waku protocols.
//!
//! Each client is a thin state machine over injected substrate handles. All
//! of them share peer selection ([`peer`]) and the message codecs from
//! `waku-message`.
//!
//! # Modules
//!
//! - [`relay`]: publish to and observe the pub/sub mesh
//! - [`light_push`]: publish through a service peer, one request/response
//! - [`filter`]: receive pushes for a set of content topics from a service peer
//! - [`store`]: page through history held by a service peer
//! - [`rpc`]: request/response shapes exchanged on the wire
//!
//! No client retries on its own. Failures surface to the caller.

use core::time::Duration;

use thiserror::Error;
use waku_message::EncodeError;
use waku_network_primitives::stream::CodecError;
use waku_primitives::{Protocols, PubSubTopic};

mod dispatch;
pub mod filter;
pub mod light_push;
pub mod peer;
pub mod relay;
pub mod rpc;
pub mod store;

pub use dispatch::Callback;
pub use filter::{FilterClient, Subscription};
pub use light_push::{LightPushClient, PushOutcome};
pub use relay::{ObserverHandle, RelayClient};
pub use store::{StoreClient, StoreQueryOptions};

/// Default bound on waiting for a single response frame.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Failures of a protocol call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// No connected peer advertises the protocol, or the requested peer is
    /// unknown or does not support it.
    #[error("no peer available for {0}")]
    NoPeerAvailable(Protocols),
    /// The payload could not be encoded. Raised before any network I/O.
    #[error(transparent)]
    Encoding(#[from] EncodeError),
    /// Failure reported by the substrate, passed through untouched.
    #[error(transparent)]
    Substrate(#[from] eyre::Report),
    /// Framing, transport or response-timeout failure on a protocol stream.
    #[error(transparent)]
    Stream(#[from] CodecError),
    /// The peer closed the stream before answering.
    #[error("peer closed the stream without responding")]
    NoResponse,
    /// The peer answered with something other than the expected response.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(&'static str),
    /// The peer answered with an explicit error.
    #[error("request rejected by peer: {0}")]
    Rejected(String),
}

/// Settings shared by the request/response clients.
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Pub/sub topic named in every request.
    pub pubsub_topic: PubSubTopic,
    /// Bound on waiting for each response frame.
    pub request_timeout: Duration,
}

impl ClientOptions {
    /// Options for `pubsub_topic` with the default timeout.
    #[must_use]
    pub const fn new(pubsub_topic: PubSubTopic) -> Self {
        Self {
            pubsub_topic,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Overrides the response timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new(PubSubTopic::default())
    }
}
