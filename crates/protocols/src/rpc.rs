//! Frames exchanged on the request/response protocol streams.
//!
//! Every exchange carries a `request_id` chosen by the client. Responses echo
//! it, and filter pushes carry the id of the subscription they belong to.

use borsh::{BorshDeserialize, BorshSerialize};
use waku_message::Envelope;
use waku_primitives::{ContentTopic, PubSubTopic};

// ═══════════════════════════════════════════════════════════════════════════
// Light push
// ═══════════════════════════════════════════════════════════════════════════

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct PushRpc {
    pub request_id: String,
    pub request: Option<PushRequest>,
    pub response: Option<PushResponse>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct PushRequest {
    pub pubsub_topic: PubSubTopic,
    pub message: Envelope,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct PushResponse {
    pub is_success: bool,
    /// Reason for a rejection, free text from the service peer.
    pub info: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Filter
// ═══════════════════════════════════════════════════════════════════════════

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct FilterRpc {
    pub request_id: String,
    pub request: Option<FilterRequest>,
    pub push: Option<MessagePush>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct FilterRequest {
    /// `false` removes the listed content filters.
    pub subscribe: bool,
    pub pubsub_topic: PubSubTopic,
    pub content_filters: Vec<ContentFilter>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ContentFilter {
    pub content_topic: ContentTopic,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct MessagePush {
    pub messages: Vec<Envelope>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Store
// ═══════════════════════════════════════════════════════════════════════════

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct HistoryRpc {
    pub request_id: String,
    pub query: Option<HistoryQuery>,
    pub response: Option<HistoryResponse>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct HistoryQuery {
    pub pubsub_topic: PubSubTopic,
    pub content_filters: Vec<ContentFilter>,
    pub paging_info: PagingInfo,
    /// Unix nanoseconds, inclusive.
    pub start_time: Option<i64>,
    /// Unix nanoseconds, inclusive.
    pub end_time: Option<i64>,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct PagingInfo {
    pub page_size: u64,
    pub cursor: Option<Cursor>,
    pub direction: PageDirection,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct HistoryResponse {
    pub messages: Vec<Envelope>,
    /// Resumes the query after the last message of this page.
    pub cursor: Option<Cursor>,
    pub has_more_pages: bool,
    pub error: Option<String>,
}

/// Order in which history pages are walked.
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PageDirection {
    /// Newest messages first.
    #[default]
    Backward,
    Forward,
}

/// Opaque resume point issued by a store service peer.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Cursor(Vec<u8>);

impl Cursor {
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
