//! Service peers answering the client protocols over a [`MemoryNetwork`].

use std::sync::Arc;

use eyre::Result;
use futures_util::StreamExt;
use parking_lot::Mutex;
use waku_message::Envelope;
use waku_network_primitives::memory::{MemoryNetwork, MemoryNode};
use waku_network_primitives::stream::{recv, send, Stream};
use waku_network_primitives::StreamControl;
use waku_primitives::protocol::{FILTER_CODEC, LIGHT_PUSH_CODEC, STORE_CODEC};
use waku_primitives::PeerId;
use waku_protocols::rpc::{
    Cursor, FilterRpc, HistoryQuery, HistoryResponse, HistoryRpc, MessagePush, PageDirection,
    PushRequest, PushResponse, PushRpc,
};

use super::TEST_TIMEOUT;

// ═══════════════════════════════════════════════════════════════════════════
// Light push
// ═══════════════════════════════════════════════════════════════════════════

pub struct LightPushService {
    pub node: Arc<MemoryNode>,
    requests: Arc<Mutex<Vec<(PeerId, PushRequest)>>>,
}

impl LightPushService {
    /// Answers every push with `response`, or never answers when `None`.
    pub async fn spawn(network: &MemoryNetwork, response: Option<PushResponse>) -> Result<Self> {
        let node = network.join([LIGHT_PUSH_CODEC]);
        let mut incoming = node.accept(LIGHT_PUSH_CODEC).await?;
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        drop(tokio::spawn(async move {
            let mut held: Vec<Stream> = Vec::new();

            while let Some((peer_id, mut stream)) = incoming.next().await {
                let Ok(Some(rpc)) = recv::<PushRpc>(&mut stream, TEST_TIMEOUT).await else {
                    continue;
                };

                if let Some(request) = rpc.request {
                    recorded.lock().push((peer_id, request));
                }

                let Some(response) = response.clone() else {
                    held.push(stream);
                    continue;
                };

                let reply = PushRpc {
                    request_id: rpc.request_id,
                    request: None,
                    response: Some(response),
                };
                let _ignored = send(&mut stream, &reply).await;
            }
        }));

        Ok(Self { node, requests })
    }

    pub fn requests(&self) -> Vec<(PeerId, PushRequest)> {
        self.requests.lock().clone()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Filter
// ═══════════════════════════════════════════════════════════════════════════

pub struct FilterService {
    pub node: Arc<MemoryNode>,
    requests: Arc<Mutex<Vec<(PeerId, FilterRpc)>>>,
}

impl FilterService {
    /// Records subscription requests. Pushes are sent explicitly with
    /// [`Self::push`].
    pub async fn spawn(network: &MemoryNetwork) -> Result<Self> {
        let node = network.join([FILTER_CODEC]);
        let mut incoming = node.accept(FILTER_CODEC).await?;
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        drop(tokio::spawn(async move {
            while let Some((peer_id, mut stream)) = incoming.next().await {
                while let Ok(Some(rpc)) = recv::<FilterRpc>(&mut stream, TEST_TIMEOUT).await {
                    recorded.lock().push((peer_id, rpc));
                }
            }
        }));

        Ok(Self { node, requests })
    }

    pub fn requests(&self) -> Vec<(PeerId, FilterRpc)> {
        self.requests.lock().clone()
    }

    pub async fn push(
        &self,
        subscriber: PeerId,
        request_id: &str,
        messages: Vec<Envelope>,
    ) -> Result<()> {
        let mut stream = self.node.open_stream(subscriber, FILTER_CODEC).await?;

        let rpc = FilterRpc {
            request_id: request_id.to_owned(),
            request: None,
            push: Some(MessagePush { messages }),
        };

        send(&mut stream, &rpc).await?;

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════════

enum Answer {
    History(Vec<Envelope>),
    Fixed(HistoryResponse),
}

pub struct StoreService {
    pub node: Arc<MemoryNode>,
    queries: Arc<Mutex<Vec<HistoryQuery>>>,
}

impl StoreService {
    /// Serves `history`, oldest first, with offset cursors.
    pub async fn spawn(network: &MemoryNetwork, history: Vec<Envelope>) -> Result<Self> {
        Self::spawn_with(network, Answer::History(history)).await
    }

    /// Rejects every query with `reason`.
    pub async fn spawn_rejecting(network: &MemoryNetwork, reason: &str) -> Result<Self> {
        Self::spawn_responding(
            network,
            HistoryResponse {
                messages: Vec::new(),
                cursor: None,
                has_more_pages: false,
                error: Some(reason.to_owned()),
            },
        )
        .await
    }

    /// Answers every query with `response`.
    pub async fn spawn_responding(
        network: &MemoryNetwork,
        response: HistoryResponse,
    ) -> Result<Self> {
        Self::spawn_with(network, Answer::Fixed(response)).await
    }

    async fn spawn_with(network: &MemoryNetwork, answer: Answer) -> Result<Self> {
        let node = network.join([STORE_CODEC]);
        let mut incoming = node.accept(STORE_CODEC).await?;
        let queries = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&queries);
        drop(tokio::spawn(async move {
            while let Some((_, mut stream)) = incoming.next().await {
                let Ok(Some(rpc)) = recv::<HistoryRpc>(&mut stream, TEST_TIMEOUT).await else {
                    continue;
                };
                let Some(query) = rpc.query else {
                    continue;
                };

                recorded.lock().push(query.clone());

                let response = match &answer {
                    Answer::History(history) => page(history, &query),
                    Answer::Fixed(response) => response.clone(),
                };

                let reply = HistoryRpc {
                    request_id: rpc.request_id,
                    query: None,
                    response: Some(response),
                };
                let _ignored = send(&mut stream, &reply).await;
            }
        }));

        Ok(Self { node, queries })
    }

    pub fn queries(&self) -> Vec<HistoryQuery> {
        self.queries.lock().clone()
    }
}

fn page(history: &[Envelope], query: &HistoryQuery) -> HistoryResponse {
    let mut matching: Vec<&Envelope> = history
        .iter()
        .filter(|envelope| {
            query.content_filters.is_empty()
                || query
                    .content_filters
                    .iter()
                    .any(|filter| filter.content_topic == envelope.content_topic)
        })
        .filter(|envelope| match (query.start_time, envelope.timestamp) {
            (Some(start), Some(at)) => at >= start,
            _ => true,
        })
        .filter(|envelope| match (query.end_time, envelope.timestamp) {
            (Some(end), Some(at)) => at <= end,
            _ => true,
        })
        .collect();

    if query.paging_info.direction == PageDirection::Backward {
        matching.reverse();
    }

    let offset = query
        .paging_info
        .cursor
        .as_ref()
        .and_then(|cursor| cursor.as_bytes().try_into().ok())
        .map_or(0, |bytes| usize::try_from(u64::from_le_bytes(bytes)).unwrap_or(usize::MAX))
        .min(matching.len());

    let page_size = usize::try_from(query.paging_info.page_size).unwrap_or(usize::MAX);
    let end = offset.saturating_add(page_size).min(matching.len());
    let has_more_pages = end < matching.len();

    HistoryResponse {
        messages: matching[offset..end].iter().map(|&e| e.clone()).collect(),
        cursor: has_more_pages.then(|| Cursor::new((end as u64).to_le_bytes().to_vec())),
        has_more_pages,
        error: None,
    }
}
