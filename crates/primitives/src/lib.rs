//! Types shared by every layer of the client: topics, protocol roles and
//! identifiers, the peer record read from the substrate, and byte helpers.

pub mod peer;
pub mod protocol;
pub mod topic;
pub mod utils;

pub use peer::{Peer, PeerId};
pub use protocol::Protocols;
pub use topic::{ContentTopic, PubSubTopic, DEFAULT_PUBSUB_TOPIC};
