//! The narrow surface the protocol clients need from a peer-to-peer
//! substrate: a peer registry, protocol streams, a pub/sub mesh, an address
//! book, and a feed of network events.
//!
//! Concrete substrates implement the traits in [`client`]. An in-process
//! implementation is available in [`memory`] behind the `testing` feature.

pub mod client;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod messages;
pub mod stream;

pub use client::{AddressBook, NetworkEvents, PeerStore, PubSub, StreamControl, Substrate};
pub use messages::NetworkEvent;
pub use stream::{IncomingStreams, Stream};
