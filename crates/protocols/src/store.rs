//! Store: page through the history a service peer keeps.
//!
//! Queries are lazy. Nothing is sent until the returned stream is polled,
//! each page costs one request on a fresh stream, and dropping the stream
//! stops the walk after the page in flight.

use std::sync::Arc;

use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream};
use futures_util::{StreamExt, TryStreamExt};
use tracing::{debug, info_span, Instrument, Span};
use waku_message::{EncodeError, Message, MessageDecoder};
use waku_network_primitives::stream::{recv, send};
use waku_network_primitives::{PeerStore, StreamControl};
use waku_primitives::{Peer, PeerId, Protocols, PubSubTopic};

use crate::dispatch::{decode_first, new_request_id};
use crate::peer::{get_peers_for_protocol, select_peer_for_protocol, SelectedPeer};
use crate::rpc::{
    ContentFilter, Cursor, HistoryQuery, HistoryResponse, HistoryRpc, PageDirection, PagingInfo,
};
use crate::{ClientOptions, ProtocolError};

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Narrows a history query. Content topics come from the decoders.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct StoreQueryOptions {
    /// Overrides the client's pub/sub topic.
    pub pubsub_topic: Option<PubSubTopic>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Falls back to the client's default page size.
    pub page_size: Option<u64>,
    pub direction: PageDirection,
    /// Resume an earlier walk.
    pub cursor: Option<Cursor>,
    pub peer_id: Option<PeerId>,
}

impl StoreQueryOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pubsub_topic: None,
            start_time: None,
            end_time: None,
            page_size: None,
            direction: PageDirection::Backward,
            cursor: None,
            peer_id: None,
        }
    }

    #[must_use]
    pub fn with_pubsub_topic(mut self, pubsub_topic: PubSubTopic) -> Self {
        self.pubsub_topic = Some(pubsub_topic);
        self
    }

    #[must_use]
    pub const fn with_time_range(
        mut self,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start_time;
        self.end_time = end_time;
        self
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub const fn with_direction(mut self, direction: PageDirection) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    #[must_use]
    pub const fn with_peer(mut self, peer_id: PeerId) -> Self {
        self.peer_id = Some(peer_id);
        self
    }
}

impl Default for StoreQueryOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// One page of decoded history.
#[derive(Clone, Debug)]
pub struct Page {
    pub messages: Vec<Message>,
    /// Where a later query can resume. `None` once history is exhausted.
    pub cursor: Option<Cursor>,
}

#[derive(Clone)]
pub struct StoreClient {
    peer_store: Arc<dyn PeerStore>,
    streams: Arc<dyn StreamControl>,
    options: ClientOptions,
    default_page_size: u64,
    span: Span,
}

impl StoreClient {
    pub fn new(
        peer_store: Arc<dyn PeerStore>,
        streams: Arc<dyn StreamControl>,
        options: ClientOptions,
    ) -> Self {
        Self {
            peer_store,
            streams,
            options,
            default_page_size: DEFAULT_PAGE_SIZE,
            span: info_span!("store"),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Page size used when a query does not set one.
    #[must_use]
    pub const fn with_default_page_size(mut self, page_size: u64) -> Self {
        self.default_page_size = page_size;
        self
    }

    #[must_use]
    pub const fn default_page_size(&self) -> u64 {
        self.default_page_size
    }

    /// Decoded history messages, page by page in the requested direction.
    ///
    /// Envelopes no decoder accepts are skipped. The stream ends after the
    /// last page or after yielding the first error.
    pub fn query_history(
        &self,
        decoders: Vec<Arc<dyn MessageDecoder>>,
        options: StoreQueryOptions,
    ) -> impl Stream<Item = Result<Message, ProtocolError>> + Send + '_ {
        self.query_pages(decoders, options)
            .map_ok(|page| stream::iter(page.messages).map(Ok))
            .try_flatten()
    }

    /// Like [`Self::query_history`], one item per page, with the cursor to
    /// resume from.
    pub fn query_pages(
        &self,
        decoders: Vec<Arc<dyn MessageDecoder>>,
        options: StoreQueryOptions,
    ) -> impl Stream<Item = Result<Page, ProtocolError>> + Send + '_ {
        let span = self.span.clone();

        try_stream! {
            let start_time = to_nanos(options.start_time)?;
            let end_time = to_nanos(options.end_time)?;

            let selected = select_peer_for_protocol(
                &*self.peer_store,
                Protocols::Store.codecs(),
                options.peer_id.as_ref(),
            )
            .await
            .ok_or(ProtocolError::NoPeerAvailable(Protocols::Store))?;

            let mut content_filters = Vec::with_capacity(decoders.len());
            for decoder in &decoders {
                let filter = ContentFilter { content_topic: decoder.content_topic().clone() };
                if !content_filters.contains(&filter) {
                    content_filters.push(filter);
                }
            }

            let mut query = HistoryQuery {
                pubsub_topic: options
                    .pubsub_topic
                    .clone()
                    .unwrap_or_else(|| self.options.pubsub_topic.clone()),
                content_filters,
                paging_info: PagingInfo {
                    page_size: options.page_size.unwrap_or(self.default_page_size),
                    cursor: options.cursor.clone(),
                    direction: options.direction,
                },
                start_time,
                end_time,
            };

            loop {
                let response = self
                    .query_page(&selected, query.clone())
                    .instrument(span.clone())
                    .await?;

                let messages = response
                    .messages
                    .iter()
                    .filter_map(|envelope| decode_first(&decoders, envelope))
                    .collect();

                let cursor = if response.has_more_pages {
                    let cursor = response
                        .cursor
                        .ok_or(ProtocolError::UnexpectedResponse("more pages without cursor"))?;
                    Some(cursor)
                } else {
                    None
                };
                let next = cursor.clone();

                yield Page { messages, cursor };

                let Some(next) = next else {
                    break;
                };

                query.paging_info.cursor = Some(next);
            }
        }
    }

    async fn query_page(
        &self,
        selected: &SelectedPeer,
        query: HistoryQuery,
    ) -> Result<HistoryResponse, ProtocolError> {
        let request_id = new_request_id();

        debug!(
            peer_id = %selected.peer.id,
            %request_id,
            cursor = query.paging_info.cursor.is_some(),
            "Querying history page"
        );

        let mut stream = self
            .streams
            .open_stream(selected.peer.id, &selected.protocol)
            .await?;

        let request = HistoryRpc {
            request_id: request_id.clone(),
            query: Some(query),
            response: None,
        };

        send(&mut stream, &request).await?;

        let Some(reply) = recv::<HistoryRpc>(&mut stream, self.options.request_timeout).await?
        else {
            return Err(ProtocolError::NoResponse);
        };

        if reply.request_id != request_id {
            return Err(ProtocolError::UnexpectedResponse("request id mismatch"));
        }

        let response = reply
            .response
            .ok_or(ProtocolError::UnexpectedResponse("missing history response"))?;

        if let Some(error) = response.error {
            return Err(ProtocolError::Rejected(error));
        }

        Ok(response)
    }

    /// Connected peers offering store.
    pub async fn peers(&self) -> Vec<Peer> {
        get_peers_for_protocol(&*self.peer_store, Protocols::Store.codecs()).await
    }
}

fn to_nanos(time: Option<DateTime<Utc>>) -> Result<Option<i64>, ProtocolError> {
    time.map(|t| t.timestamp_nanos_opt().ok_or(EncodeError::TimestampOutOfRange))
        .transpose()
        .map_err(ProtocolError::from)
}

impl core::fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreClient")
            .field("options", &self.options)
            .field("default_page_size", &self.default_page_size)
            .finish_non_exhaustive()
    }
}
