use bytes::Bytes;
use waku_primitives::{PeerId, PubSubTopic};

/// Notifications emitted by the substrate.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum NetworkEvent {
    /// A pub/sub message arrived on a topic this node joined.
    Message {
        source: Option<PeerId>,
        topic: PubSubTopic,
        data: Bytes,
    },
    Subscribed {
        peer_id: PeerId,
        topic: PubSubTopic,
    },
    Unsubscribed {
        peer_id: PeerId,
        topic: PubSubTopic,
    },
    /// A peer was identified or changed the protocols it advertises.
    PeerIdentified {
        peer_id: PeerId,
        protocols: Vec<String>,
    },
    PeerDisconnected {
        peer_id: PeerId,
    },
}
