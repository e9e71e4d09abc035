use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use eyre::Result as EyreResult;
use multiaddr::Multiaddr;
use tokio::sync::broadcast;
use waku_primitives::{Peer, PeerId, PubSubTopic};

use crate::messages::NetworkEvent;
use crate::stream::{IncomingStreams, Stream};

/// Read access to the substrate's peer registry.
#[async_trait]
pub trait PeerStore: Send + Sync {
    /// Every connected peer with the protocols it advertises.
    async fn peers(&self) -> Vec<Peer>;

    async fn get(&self, peer_id: &PeerId) -> Option<Peer>;
}

/// Protocol-scoped byte streams to and from peers.
#[async_trait]
pub trait StreamControl: Send + Sync {
    async fn open_stream(&self, peer_id: PeerId, protocol: &str) -> EyreResult<Stream>;

    /// Starts accepting inbound streams for `protocol`.
    async fn accept(&self, protocol: &str) -> EyreResult<IncomingStreams>;
}

/// The broadcast mesh. Inbound messages arrive as
/// [`NetworkEvent::Message`].
#[async_trait]
pub trait PubSub: Send + Sync {
    fn local_peer_id(&self) -> PeerId;

    async fn subscribe(&self, topic: &PubSubTopic) -> EyreResult<()>;

    async fn unsubscribe(&self, topic: &PubSubTopic) -> EyreResult<()>;

    async fn publish(&self, topic: &PubSubTopic, data: Bytes) -> EyreResult<()>;

    /// Remote peers currently subscribed to `topic`.
    async fn subscribers(&self, topic: &PubSubTopic) -> Vec<PeerId>;
}

#[async_trait]
pub trait AddressBook: Send + Sync {
    async fn add_addresses(&self, peer_id: PeerId, addresses: Vec<Multiaddr>) -> EyreResult<()>;
}

pub trait NetworkEvents: Send + Sync {
    /// Dropping the receiver releases the subscription.
    fn events(&self) -> broadcast::Receiver<NetworkEvent>;
}

/// Handles to every substrate capability a node uses.
#[derive(Clone)]
pub struct Substrate {
    pub peer_store: Arc<dyn PeerStore>,
    pub streams: Arc<dyn StreamControl>,
    pub pubsub: Arc<dyn PubSub>,
    pub address_book: Arc<dyn AddressBook>,
    pub events: Arc<dyn NetworkEvents>,
}

impl Substrate {
    /// Uses one implementation for every capability.
    pub fn from_shared<T>(substrate: Arc<T>) -> Self
    where
        T: PeerStore + StreamControl + PubSub + AddressBook + NetworkEvents + 'static,
    {
        Self {
            peer_store: Arc::clone(&substrate) as _,
            streams: Arc::clone(&substrate) as _,
            pubsub: Arc::clone(&substrate) as _,
            address_book: Arc::clone(&substrate) as _,
            events: substrate,
        }
    }
}

impl core::fmt::Debug for Substrate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Substrate")
            .field("local_peer_id", &self.pubsub.local_peer_id())
            .finish_non_exhaustive()
    }
}
