//! Waiting for remote peers before using a protocol

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{config, eventually, full_node, init_tracing, light_node, privacy_node};
use tokio::time::Instant;
use waku_network_primitives::memory::MemoryNetwork;
use waku_node::{wait_for_remote_peer, ReadinessError};
use waku_primitives::protocol::{FILTER_CODEC, LIGHT_PUSH_CODEC, STORE_CODEC};
use waku_primitives::Protocols;

#[tokio::test(start_paused = true)]
async fn test_times_out_and_releases_subscription() -> eyre::Result<()> {
    init_tracing();

    let network = MemoryNetwork::new();
    let (member, node) = light_node(&network)?;
    let baseline = member.event_subscribers();

    let started = Instant::now();
    let result = wait_for_remote_peer(
        &node,
        Some(&[Protocols::Store]),
        Some(Duration::from_millis(200)),
    )
    .await;
    let elapsed = started.elapsed();

    let Err(err) = result else {
        eyre::bail!("wait succeeded without a store peer");
    };
    assert!(elapsed >= Duration::from_millis(200), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "gave up after {elapsed:?}");
    assert!(matches!(err, ReadinessError::Timeout));
    assert_eq!(err.to_string(), "Timed out waiting for a remote peer.");
    assert_eq!(member.event_subscribers(), baseline);

    Ok(())
}

#[tokio::test]
async fn test_resolves_for_connected_service_peer() -> eyre::Result<()> {
    init_tracing();

    let network = MemoryNetwork::new();
    let _service = network.join([STORE_CODEC]);
    let (_member, node) = light_node(&network)?;

    wait_for_remote_peer(&node, Some(&[Protocols::Store]), Some(common::TEST_TIMEOUT)).await?;

    Ok(())
}

#[tokio::test]
async fn test_resolves_when_peer_identifies_later() -> eyre::Result<()> {
    init_tracing();

    let network = MemoryNetwork::new();
    let (member, node) = light_node(&network)?;
    let baseline = member.event_subscribers();

    let waiting = {
        let node = Arc::clone(&node);
        tokio::spawn(async move {
            wait_for_remote_peer(&node, Some(&[Protocols::LightPush]), Some(common::TEST_TIMEOUT))
                .await
        })
    };

    assert!(eventually(|| member.event_subscribers() > baseline).await);
    assert!(!waiting.is_finished());

    let _service = network.join([LIGHT_PUSH_CODEC]);

    waiting.await??;
    assert_eq!(member.event_subscribers(), baseline);

    Ok(())
}

#[tokio::test]
async fn test_protocol_update_satisfies_wait() -> eyre::Result<()> {
    init_tracing();

    let network = MemoryNetwork::new();
    let service = network.join([STORE_CODEC]);
    let (_member, node) = light_node(&network)?;

    let waiting = {
        let node = Arc::clone(&node);
        tokio::spawn(async move {
            wait_for_remote_peer(&node, Some(&[Protocols::Filter]), Some(common::TEST_TIMEOUT))
                .await
        })
    };

    service.set_protocols([STORE_CODEC, FILTER_CODEC]);

    waiting.await??;

    Ok(())
}

#[tokio::test]
async fn test_default_requires_every_active_protocol() -> eyre::Result<()> {
    init_tracing();

    let network = MemoryNetwork::new();
    let service = network.join([STORE_CODEC, LIGHT_PUSH_CODEC]);
    let (_member, node) = light_node(&network)?;

    let result = wait_for_remote_peer(&node, None, Some(Duration::from_millis(150))).await;
    assert!(matches!(result, Err(ReadinessError::Timeout)));

    service.set_protocols([STORE_CODEC, LIGHT_PUSH_CODEC, FILTER_CODEC]);

    wait_for_remote_peer(&node, None, Some(common::TEST_TIMEOUT)).await?;

    Ok(())
}

#[tokio::test]
async fn test_relay_peer_dialed_first() -> eyre::Result<()> {
    init_tracing();

    let network = MemoryNetwork::new();
    let (_a, alice) = privacy_node(&network, config())?;
    let (_b, bob) = privacy_node(&network, config())?;

    alice.start().await?;
    bob.start().await?;

    wait_for_remote_peer(&alice, Some(&[Protocols::Relay]), Some(common::TEST_TIMEOUT)).await?;

    Ok(())
}

#[tokio::test]
async fn test_relay_peer_dialed_after() -> eyre::Result<()> {
    init_tracing();

    let network = MemoryNetwork::new();
    let (_a, alice) = privacy_node(&network, config())?;
    let (_b, bob) = privacy_node(&network, config())?;

    alice.start().await?;

    let waiting = {
        let alice = Arc::clone(&alice);
        tokio::spawn(async move {
            wait_for_remote_peer(&alice, None, Some(common::TEST_TIMEOUT)).await
        })
    };

    bob.start().await?;

    waiting.await??;

    Ok(())
}

#[tokio::test]
async fn test_stop_abandons_wait() -> eyre::Result<()> {
    init_tracing();

    let network = MemoryNetwork::new();
    let (member, node) = full_node(&network)?;
    node.start().await?;

    let baseline = member.event_subscribers();

    let waiting = {
        let node = Arc::clone(&node);
        tokio::spawn(async move { wait_for_remote_peer(&node, None, None).await })
    };

    assert!(eventually(|| member.event_subscribers() > baseline).await);

    node.stop().await?;

    assert!(matches!(waiting.await?, Err(ReadinessError::NodeStopped)));
    assert!(member.event_subscribers() <= baseline);

    Ok(())
}

#[tokio::test]
async fn test_inactive_protocol_is_rejected() -> eyre::Result<()> {
    init_tracing();

    let network = MemoryNetwork::new();
    let (_member, node) = light_node(&network)?;

    let result = wait_for_remote_peer(&node, Some(&[Protocols::Relay]), None).await;

    assert!(matches!(
        result,
        Err(ReadinessError::NotActive(Protocols::Relay))
    ));

    Ok(())
}
