//! Waiting until remote peers can serve the protocols a caller needs.
//!
//! Two triggers re-check the peer registry: every substrate event (identify
//! results, relay subscriptions, disconnects) and a fixed poll interval for
//! substrates that do not report everything as events. Whichever sees the
//! condition met first resolves the wait. The event subscription lives inside
//! the wait future, so it is released on success, timeout and shutdown alike.

use core::future::pending;
use core::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::time::{interval, timeout as with_timeout, MissedTickBehavior};
use tracing::{debug, info_span, trace, Instrument};
use waku_network_primitives::NetworkEvent;
use waku_primitives::Protocols;

use crate::WakuNode;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReadinessError {
    #[error("Timed out waiting for a remote peer.")]
    Timeout,
    #[error("node stopped while waiting for a remote peer")]
    NodeStopped,
    #[error("cannot wait for {0} peers: protocol is not active on this node")]
    NotActive(Protocols),
}

/// Resolves once, for every protocol in `protocols`, some remote peer can
/// serve it.
///
/// `None` means every protocol active on the node. Relay is satisfied by a
/// remote subscriber on the node's pub/sub topic, the others by a connected
/// peer advertising the protocol. Without `timeout` the wait only ends when
/// satisfied or when the node is stopped.
pub async fn wait_for_remote_peer(
    node: &WakuNode,
    protocols: Option<&[Protocols]>,
    timeout: Option<Duration>,
) -> Result<(), ReadinessError> {
    let required = protocols.map_or_else(|| node.active_protocols(), <[_]>::to_vec);

    if let Some(inactive) = required.iter().find(|p| !node.is_active(**p)) {
        return Err(ReadinessError::NotActive(*inactive));
    }

    let shutdown = node.shutdown_token();
    let span = info_span!("readiness", peer_id = %node.local_peer_id(), ?required);

    let wait = async {
        tokio::select! {
            () = shutdown.cancelled() => Err(ReadinessError::NodeStopped),
            () = until_satisfied(node, &required) => Ok(()),
        }
    }
    .instrument(span.clone());

    let outcome = match timeout {
        Some(limit) => with_timeout(limit, wait)
            .await
            .unwrap_or(Err(ReadinessError::Timeout)),
        None => wait.await,
    };

    match &outcome {
        Ok(()) => debug!(parent: &span, "Remote peers ready"),
        Err(err) => debug!(parent: &span, %err, "Stopped waiting for remote peers"),
    }

    outcome
}

async fn until_satisfied(node: &WakuNode, required: &[Protocols]) {
    // Subscribe before the first check so no event between the check and
    // the subscription can be missed.
    let mut events = Some(node.substrate().events.events());

    let mut ticker = interval(node.config().readiness.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if is_satisfied(node, required).await {
            return;
        }

        tokio::select! {
            event = next_event(&mut events) => {
                trace!(?event, "Re-checking readiness after network event");
            }
            _ = ticker.tick() => {
                trace!("Re-checking readiness on poll");
            }
        }
    }
}

/// Next event, or never once the feed has closed so polling takes over.
async fn next_event(events: &mut Option<Receiver<NetworkEvent>>) -> Option<NetworkEvent> {
    let Some(receiver) = events else {
        return pending().await;
    };

    match receiver.recv().await {
        Ok(event) => Some(event),
        Err(RecvError::Lagged(_)) => None,
        Err(RecvError::Closed) => {
            *events = None;
            None
        }
    }
}

async fn is_satisfied(node: &WakuNode, required: &[Protocols]) -> bool {
    let substrate = node.substrate();
    let topic = &node.config().pubsub_topic;

    let mut peers = None;

    for protocol in required {
        let satisfied = if *protocol == Protocols::Relay {
            !substrate.pubsub.subscribers(topic).await.is_empty()
        } else {
            if peers.is_none() {
                peers = Some(substrate.peer_store.peers().await);
            }

            peers
                .iter()
                .flatten()
                .any(|peer| peer.supports(*protocol))
        };

        if !satisfied {
            return false;
        }
    }

    true
}
