//! In-process substrate for tests.
//!
//! Every node joined to a [`MemoryNetwork`] is connected to every other
//! node. Streams are [`tokio::io::duplex`] pipes handed to whichever task
//! called [`StreamControl::accept`] for the protocol.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use eyre::{bail, eyre, Result as EyreResult};
use multiaddr::Multiaddr;
use parking_lot::Mutex;
use tokio::io::duplex;
use tokio::sync::{broadcast, mpsc};
use tracing::trace;
use waku_primitives::{Peer, PeerId, PubSubTopic};

use crate::client::{AddressBook, NetworkEvents, PeerStore, PubSub, StreamControl, Substrate};
use crate::messages::NetworkEvent;
use crate::stream::{IncomingStreams, Stream};

const EVENT_CAPACITY: usize = 256;
const STREAM_BUFFER: usize = 64 * 1_024;
const ACCEPT_BACKLOG: usize = 16;

#[derive(Clone, Debug, Default)]
pub struct MemoryNetwork {
    hub: Arc<Mutex<Hub>>,
}

#[derive(Debug, Default)]
struct Hub {
    nodes: HashMap<PeerId, NodeState>,
}

#[derive(Debug)]
struct NodeState {
    protocols: BTreeSet<String>,
    topics: BTreeSet<PubSubTopic>,
    addresses: HashMap<PeerId, Vec<Multiaddr>>,
    events: broadcast::Sender<NetworkEvent>,
    handlers: HashMap<String, mpsc::Sender<(PeerId, Stream)>>,
}

impl Hub {
    fn notify_others(&self, except: &PeerId, event: &NetworkEvent) {
        for (peer_id, state) in &self.nodes {
            if peer_id != except {
                let _ignored = state.events.send(event.clone());
            }
        }
    }

    fn peer(&self, local: &PeerId, peer_id: &PeerId) -> Option<Peer> {
        if local == peer_id {
            return None;
        }

        let remote = self.nodes.get(peer_id)?;
        let addresses = self
            .nodes
            .get(local)
            .and_then(|state| state.addresses.get(peer_id))
            .cloned()
            .unwrap_or_default();

        Some(Peer {
            id: *peer_id,
            protocols: remote.protocols.clone(),
            addresses,
        })
    }
}

impl MemoryNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node advertising `protocols` and announces it to the others.
    pub fn join<I, S>(&self, protocols: I) -> Arc<MemoryNode>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = PeerId::random();
        let protocols: BTreeSet<String> = protocols.into_iter().map(Into::into).collect();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let mut hub = self.hub.lock();

        hub.notify_others(
            &id,
            &NetworkEvent::PeerIdentified {
                peer_id: id,
                protocols: protocols.iter().cloned().collect(),
            },
        );

        drop(hub.nodes.insert(
            id,
            NodeState {
                protocols,
                topics: BTreeSet::new(),
                addresses: HashMap::new(),
                events: events.clone(),
                handlers: HashMap::new(),
            },
        ));

        Arc::new(MemoryNode {
            id,
            hub: Arc::clone(&self.hub),
            events,
        })
    }
}

#[derive(Debug)]
pub struct MemoryNode {
    id: PeerId,
    hub: Arc<Mutex<Hub>>,
    events: broadcast::Sender<NetworkEvent>,
}

impl MemoryNode {
    #[must_use]
    pub const fn id(&self) -> PeerId {
        self.id
    }

    #[must_use]
    pub fn substrate(self: &Arc<Self>) -> Substrate {
        Substrate::from_shared(Arc::clone(self))
    }

    /// Replaces the advertised protocol set, as a fresh identify round would.
    pub fn set_protocols<I, S>(&self, protocols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut hub = self.hub.lock();

        let Some(state) = hub.nodes.get_mut(&self.id) else {
            return;
        };

        state.protocols = protocols.into_iter().map(Into::into).collect();

        let event = NetworkEvent::PeerIdentified {
            peer_id: self.id,
            protocols: state.protocols.iter().cloned().collect(),
        };

        hub.notify_others(&self.id, &event);
    }

    /// Disconnects from every other node.
    pub fn leave(&self) {
        let mut hub = self.hub.lock();

        if hub.nodes.remove(&self.id).is_some() {
            hub.notify_others(&self.id, &NetworkEvent::PeerDisconnected { peer_id: self.id });
        }
    }

    /// Live receivers of this node's event feed.
    #[must_use]
    pub fn event_subscribers(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl PeerStore for MemoryNode {
    async fn peers(&self) -> Vec<Peer> {
        let hub = self.hub.lock();

        hub.nodes
            .keys()
            .filter_map(|peer_id| hub.peer(&self.id, peer_id))
            .collect()
    }

    async fn get(&self, peer_id: &PeerId) -> Option<Peer> {
        self.hub.lock().peer(&self.id, peer_id)
    }
}

#[async_trait]
impl StreamControl for MemoryNode {
    async fn open_stream(&self, peer_id: PeerId, protocol: &str) -> EyreResult<Stream> {
        let handler = {
            let hub = self.hub.lock();

            let Some(remote) = hub.nodes.get(&peer_id) else {
                bail!("peer {peer_id} is not connected");
            };

            let Some(handler) = remote.handlers.get(protocol) else {
                bail!("peer {peer_id} does not accept {protocol}");
            };

            handler.clone()
        };

        let (local, remote) = duplex(STREAM_BUFFER);

        handler
            .send((self.id, Stream::new(remote)))
            .await
            .map_err(|_| eyre!("peer {peer_id} stopped accepting {protocol}"))?;

        trace!(%peer_id, protocol, "Opened memory stream");

        Ok(Stream::new(local))
    }

    async fn accept(&self, protocol: &str) -> EyreResult<IncomingStreams> {
        let mut hub = self.hub.lock();

        let Some(state) = hub.nodes.get_mut(&self.id) else {
            bail!("node {} has left the network", self.id);
        };

        let (tx, rx) = mpsc::channel(ACCEPT_BACKLOG);
        drop(state.handlers.insert(protocol.to_owned(), tx));

        Ok(IncomingStreams::new(rx))
    }
}

#[async_trait]
impl PubSub for MemoryNode {
    fn local_peer_id(&self) -> PeerId {
        self.id
    }

    async fn subscribe(&self, topic: &PubSubTopic) -> EyreResult<()> {
        let mut hub = self.hub.lock();

        let Some(state) = hub.nodes.get_mut(&self.id) else {
            bail!("node {} has left the network", self.id);
        };

        if state.topics.insert(topic.clone()) {
            let event = NetworkEvent::Subscribed {
                peer_id: self.id,
                topic: topic.clone(),
            };
            hub.notify_others(&self.id, &event);
        }

        Ok(())
    }

    async fn unsubscribe(&self, topic: &PubSubTopic) -> EyreResult<()> {
        let mut hub = self.hub.lock();

        let Some(state) = hub.nodes.get_mut(&self.id) else {
            return Ok(());
        };

        if state.topics.remove(topic) {
            let event = NetworkEvent::Unsubscribed {
                peer_id: self.id,
                topic: topic.clone(),
            };
            hub.notify_others(&self.id, &event);
        }

        Ok(())
    }

    async fn publish(&self, topic: &PubSubTopic, data: Bytes) -> EyreResult<()> {
        let hub = self.hub.lock();

        let mut delivered = 0_usize;

        for (peer_id, state) in &hub.nodes {
            if *peer_id == self.id || !state.topics.contains(topic) {
                continue;
            }

            let _ignored = state.events.send(NetworkEvent::Message {
                source: Some(self.id),
                topic: topic.clone(),
                data: data.clone(),
            });

            delivered = delivered.saturating_add(1);
        }

        if delivered == 0 {
            bail!("insufficient peers subscribed to {topic}");
        }

        Ok(())
    }

    async fn subscribers(&self, topic: &PubSubTopic) -> Vec<PeerId> {
        let hub = self.hub.lock();

        hub.nodes
            .iter()
            .filter(|(peer_id, state)| **peer_id != self.id && state.topics.contains(topic))
            .map(|(peer_id, _)| *peer_id)
            .collect()
    }
}

#[async_trait]
impl AddressBook for MemoryNode {
    async fn add_addresses(&self, peer_id: PeerId, addresses: Vec<Multiaddr>) -> EyreResult<()> {
        let mut hub = self.hub.lock();

        let Some(state) = hub.nodes.get_mut(&self.id) else {
            bail!("node {} has left the network", self.id);
        };

        state.addresses.entry(peer_id).or_default().extend(addresses);

        Ok(())
    }
}

impl NetworkEvents for MemoryNode {
    fn events(&self) -> broadcast::Receiver<NetworkEvent> {
        self.events.subscribe()
    }
}
