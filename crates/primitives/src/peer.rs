use std::collections::BTreeSet;

pub use libp2p_identity::PeerId;
use multiaddr::Multiaddr;

use crate::protocol::Protocols;

/// A remote peer as recorded by the substrate's peer registry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Peer {
    pub id: PeerId,
    pub protocols: BTreeSet<String>,
    pub addresses: Vec<Multiaddr>,
}

impl Peer {
    #[must_use]
    pub const fn new(id: PeerId) -> Self {
        Self {
            id,
            protocols: BTreeSet::new(),
            addresses: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols.extend(protocols.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_addresses(mut self, addresses: Vec<Multiaddr>) -> Self {
        self.addresses.extend(addresses);
        self
    }

    #[must_use]
    pub fn supports_any(&self, protocol_ids: &[&str]) -> bool {
        protocol_ids.iter().any(|id| self.protocols.contains(*id))
    }

    #[must_use]
    pub fn supports(&self, protocol: Protocols) -> bool {
        self.supports_any(protocol.codecs())
    }
}
