//! Node fixtures over the in-process network.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing_subscriber::EnvFilter;
use waku_config::{NodeConfig, ReadinessConfig};
use waku_network_primitives::memory::{MemoryNetwork, MemoryNode};
use waku_node::{create_full_node, create_light_node, create_privacy_node, WakuNode};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(2);

pub fn config() -> NodeConfig {
    let mut config = NodeConfig::new(Vec::new());
    config.readiness = ReadinessConfig::new(Duration::from_millis(50));
    config
}

pub fn light_node(network: &MemoryNetwork) -> eyre::Result<(Arc<MemoryNode>, Arc<WakuNode>)> {
    let member = network.join(Vec::<String>::new());
    let node = create_light_node(member.substrate(), config())?;

    Ok((member, Arc::new(node)))
}

pub fn privacy_node(
    network: &MemoryNetwork,
    config: NodeConfig,
) -> eyre::Result<(Arc<MemoryNode>, Arc<WakuNode>)> {
    let member = network.join([waku_primitives::protocol::RELAY_CODEC]);
    let node = create_privacy_node(member.substrate(), config)?;

    Ok((member, Arc::new(node)))
}

pub fn full_node(network: &MemoryNetwork) -> eyre::Result<(Arc<MemoryNode>, Arc<WakuNode>)> {
    let member = network.join([waku_primitives::protocol::RELAY_CODEC]);
    let node = create_full_node(member.substrate(), config())?;

    Ok((member, Arc::new(node)))
}

/// Routes `tracing` output through the test harness. `RUST_LOG` selects
/// what is shown.
pub fn init_tracing() {
    let _ignored = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `check` until it holds or [`TEST_TIMEOUT`] passes.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + TEST_TIMEOUT;

    while Instant::now() < deadline {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }

    check()
}
