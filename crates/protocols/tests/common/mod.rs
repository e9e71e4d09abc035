//! Fixtures shared by the protocol client tests.
//!
//! Service peers are simulated by [`mocks`] on an in-process network, so
//! every test drives the real clients over real framed streams.

#![allow(dead_code, reason = "each test binary uses a different subset")]

pub mod mocks;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing_subscriber::EnvFilter;
use waku_message::version_0::{PlainDecoder, PlainEncoder};
use waku_message::{Message, MessageDecoder};
use waku_network_primitives::memory::MemoryNode;
use waku_primitives::ContentTopic;
use waku_protocols::{ClientOptions, FilterClient, LightPushClient, StoreClient};

pub const TEST_TOPIC: &str = "/test/1/waku-message/utf8";

pub const TEST_TIMEOUT: Duration = Duration::from_secs(2);

pub fn topic() -> ContentTopic {
    ContentTopic::from(TEST_TOPIC)
}

pub fn plain_encoder() -> PlainEncoder {
    PlainEncoder::new(topic())
}

pub fn plain_decoder() -> Arc<dyn MessageDecoder> {
    Arc::new(PlainDecoder::new(topic()))
}

pub fn options() -> ClientOptions {
    ClientOptions::default().with_request_timeout(TEST_TIMEOUT)
}

pub fn light_push_client(node: &Arc<MemoryNode>) -> LightPushClient {
    let substrate = node.substrate();
    LightPushClient::new(substrate.peer_store, substrate.streams, options())
}

pub fn filter_client(node: &Arc<MemoryNode>) -> FilterClient {
    let substrate = node.substrate();
    FilterClient::new(substrate.peer_store, substrate.streams, options())
}

pub fn store_client(node: &Arc<MemoryNode>) -> StoreClient {
    let substrate = node.substrate();
    StoreClient::new(substrate.peer_store, substrate.streams, options())
}

/// Messages collected by a callback.
#[derive(Clone, Debug, Default)]
pub struct Received(Arc<Mutex<Vec<Message>>>);

impl Received {
    pub fn callback(&self) -> impl Fn(Message) + Send + Sync + 'static {
        let inner = Arc::clone(&self.0);
        move |message| inner.lock().push(message)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.0.lock().clone()
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.0.lock().iter().map(|m| m.payload.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
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

/// Gives in-flight deliveries a chance to land before asserting absence.
pub async fn settle() {
    sleep(Duration::from_millis(100)).await;
}
