//! A Waku node: the protocol clients a role needs, wired to one substrate.
//!
//! Build a node with one of the presets or [`WakuNode::new`], [`start`] it,
//! then [`wait_for_remote_peer`] before issuing protocol calls.
//!
//! [`start`]: WakuNode::start

use std::sync::atomic::{AtomicBool, Ordering};

use eyre::{Result as EyreResult, WrapErr};
use multiaddr::Multiaddr;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span};
use waku_config::NodeConfig;
use waku_network_primitives::Substrate;
use waku_primitives::{PeerId, Protocols};
use waku_protocols::{
    ClientOptions, FilterClient, LightPushClient, ProtocolError, RelayClient, StoreClient,
};

mod readiness;

pub use readiness::{wait_for_remote_peer, ReadinessError};

/// Roles of a node that publishes through and reads from service peers.
pub const LIGHT_NODE_PROTOCOLS: [Protocols; 3] =
    [Protocols::Store, Protocols::LightPush, Protocols::Filter];

/// Roles of a node that only takes part in the relay mesh.
pub const PRIVACY_NODE_PROTOCOLS: [Protocols; 1] = [Protocols::Relay];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NodeError {
    #[error("{0} is not active on this node")]
    NotActive(Protocols),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Substrate(#[from] eyre::Report),
}

/// Store, light push and filter clients. No relay.
pub fn create_light_node(substrate: Substrate, config: NodeConfig) -> EyreResult<WakuNode> {
    with_protocols(substrate, config, &LIGHT_NODE_PROTOCOLS)
}

/// Relay only.
pub fn create_privacy_node(substrate: Substrate, config: NodeConfig) -> EyreResult<WakuNode> {
    with_protocols(substrate, config, &PRIVACY_NODE_PROTOCOLS)
}

/// Every protocol client.
pub fn create_full_node(substrate: Substrate, config: NodeConfig) -> EyreResult<WakuNode> {
    with_protocols(substrate, config, &Protocols::ALL)
}

fn with_protocols(
    substrate: Substrate,
    mut config: NodeConfig,
    protocols: &[Protocols],
) -> EyreResult<WakuNode> {
    config.protocols = protocols.to_vec();

    WakuNode::new(substrate, config)
}

pub struct WakuNode {
    substrate: Substrate,
    config: NodeConfig,
    relay: Option<RelayClient>,
    store: Option<StoreClient>,
    light_push: Option<LightPushClient>,
    filter: Option<FilterClient>,
    started: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Mutex<CancellationToken>,
}

impl WakuNode {
    /// Builds the clients for `config.protocols`. The node is not started.
    pub fn new(substrate: Substrate, config: NodeConfig) -> EyreResult<Self> {
        config.validate().wrap_err("invalid node configuration")?;

        let local_peer_id = substrate.pubsub.local_peer_id();
        let options = ClientOptions::new(config.pubsub_topic.clone())
            .with_request_timeout(config.request_timeout);

        let relay = config.is_active(Protocols::Relay).then(|| {
            RelayClient::new(
                substrate.pubsub.clone(),
                substrate.events.clone(),
                config.pubsub_topic.clone(),
            )
            .with_emit_self(config.emit_self)
            .with_span(info_span!("relay", %local_peer_id))
        });

        let store = config.is_active(Protocols::Store).then(|| {
            StoreClient::new(
                substrate.peer_store.clone(),
                substrate.streams.clone(),
                options.clone(),
            )
            .with_default_page_size(config.store.page_size)
            .with_span(info_span!("store", %local_peer_id))
        });

        let light_push = config.is_active(Protocols::LightPush).then(|| {
            LightPushClient::new(
                substrate.peer_store.clone(),
                substrate.streams.clone(),
                options.clone(),
            )
            .with_span(info_span!("light_push", %local_peer_id))
        });

        let filter = config.is_active(Protocols::Filter).then(|| {
            FilterClient::new(
                substrate.peer_store.clone(),
                substrate.streams.clone(),
                options.clone(),
            )
            .with_span(info_span!("filter", %local_peer_id))
        });

        Ok(Self {
            substrate,
            config,
            relay,
            store,
            light_push,
            filter,
            started: AtomicBool::new(false),
            tasks: Mutex::default(),
            shutdown: Mutex::default(),
        })
    }

    #[must_use]
    pub fn local_peer_id(&self) -> PeerId {
        self.substrate.pubsub.local_peer_id()
    }

    #[must_use]
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    #[must_use]
    pub const fn substrate(&self) -> &Substrate {
        &self.substrate
    }

    #[must_use]
    pub fn active_protocols(&self) -> Vec<Protocols> {
        self.config.protocols.clone()
    }

    #[must_use]
    pub fn is_active(&self, protocol: Protocols) -> bool {
        self.config.is_active(protocol)
    }

    #[must_use]
    pub const fn relay(&self) -> Option<&RelayClient> {
        self.relay.as_ref()
    }

    #[must_use]
    pub const fn store(&self) -> Option<&StoreClient> {
        self.store.as_ref()
    }

    #[must_use]
    pub const fn light_push(&self) -> Option<&LightPushClient> {
        self.light_push.as_ref()
    }

    #[must_use]
    pub const fn filter(&self) -> Option<&FilterClient> {
        self.filter.as_ref()
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Joins the relay topic and starts accepting filter pushes, for
    /// whichever of the two are active. Starting twice is a no-op.
    pub async fn start(&self) -> Result<(), NodeError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut tasks = Vec::with_capacity(2);

        if let Some(relay) = &self.relay {
            match relay.start().await {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    self.started.store(false, Ordering::Release);
                    return Err(err.into());
                }
            }
        }

        if let Some(filter) = &self.filter {
            match filter.start().await {
                Ok(task) => tasks.push(task),
                Err(err) => {
                    for task in &tasks {
                        task.abort();
                    }
                    self.started.store(false, Ordering::Release);
                    return Err(err.into());
                }
            }
        }

        self.tasks.lock().extend(tasks);

        info!(
            peer_id = %self.local_peer_id(),
            protocols = ?self.config.protocols,
            "Node started"
        );

        Ok(())
    }

    /// Abandons outstanding readiness waits. On a started node, also stops
    /// background tasks, drops filter subscriptions and leaves the relay
    /// topic.
    pub async fn stop(&self) -> Result<(), NodeError> {
        core::mem::take(&mut *self.shutdown.lock()).cancel();

        if !self.started.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        for task in self.tasks.lock().drain(..) {
            task.abort();
        }

        if let Some(filter) = &self.filter {
            filter.clear_subscriptions();
        }

        if let Some(relay) = &self.relay {
            relay.stop().await?;
        }

        info!(peer_id = %self.local_peer_id(), "Node stopped");

        Ok(())
    }

    pub async fn add_peer_to_address_book(
        &self,
        peer_id: PeerId,
        addresses: Vec<Multiaddr>,
    ) -> Result<(), NodeError> {
        debug!(%peer_id, count = addresses.len(), "Adding peer addresses");

        self.substrate
            .address_book
            .add_addresses(peer_id, addresses)
            .await?;

        Ok(())
    }

    /// Token cancelled by the next [`Self::stop`].
    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.lock().clone()
    }
}

impl core::fmt::Debug for WakuNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WakuNode")
            .field("peer_id", &self.local_peer_id())
            .field("protocols", &self.config.protocols)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}
