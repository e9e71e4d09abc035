//! Peer selection for request/response protocols.
//!
//! A peer qualifies when it advertises at least one of the protocol ids the
//! caller accepts. When the caller names no peer, one qualifying peer is
//! picked uniformly at random.

use rand::seq::SliceRandom;
use rand::thread_rng;
use tracing::{debug, warn};
use waku_network_primitives::PeerStore;
use waku_primitives::{Peer, PeerId};

/// A peer together with the protocol id to open streams with.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectedPeer {
    pub peer: Peer,
    pub protocol: String,
}

/// Connected peers advertising at least one of `protocols`.
pub async fn get_peers_for_protocol(peer_store: &dyn PeerStore, protocols: &[&str]) -> Vec<Peer> {
    peer_store
        .peers()
        .await
        .into_iter()
        .filter(|peer| peer.supports_any(protocols))
        .collect()
}

/// Uniformly random choice, `None` for an empty slice.
#[must_use]
pub fn select_random_peer(peers: &[Peer]) -> Option<&Peer> {
    peers.choose(&mut thread_rng())
}

/// Picks the peer to talk to and the protocol id to negotiate.
///
/// With `peer_id` set, only that peer is considered. Otherwise a random
/// peer among those advertising any of `protocols`. The negotiated protocol
/// is the last entry of `protocols` the chosen peer supports, so callers list
/// ids from oldest to newest.
pub async fn select_peer_for_protocol(
    peer_store: &dyn PeerStore,
    protocols: &[&str],
    peer_id: Option<&PeerId>,
) -> Option<SelectedPeer> {
    let peer = if let Some(peer_id) = peer_id {
        let Some(peer) = peer_store.get(peer_id).await else {
            warn!(%peer_id, "Requested peer is not in the peer store");
            return None;
        };

        peer
    } else {
        let peers = get_peers_for_protocol(peer_store, protocols).await;

        let Some(peer) = select_random_peer(&peers) else {
            debug!(?protocols, "No peer available for protocols");
            return None;
        };

        peer.clone()
    };

    let Some(protocol) = protocols
        .iter()
        .rev()
        .find(|protocol| peer.protocols.contains(**protocol))
    else {
        warn!(peer_id = %peer.id, ?protocols, "Peer does not support any requested protocol");
        return None;
    };

    Some(SelectedPeer {
        protocol: (*protocol).to_owned(),
        peer,
    })
}

#[cfg(test)]
#[path = "tests/peer.rs"]
mod tests;
