use chrono::{DateTime, TimeZone, Utc};
use waku_crypto::signature::SIGNATURE_LEN;
use waku_crypto::PublicKey;
use waku_primitives::ContentTopic;

use crate::{DecodeError, EncodeError, Envelope};

/// What the application hands to an encoder.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MessageInput {
    pub payload: Vec<u8>,
    /// Defaults to the time of encoding.
    pub timestamp: Option<DateTime<Utc>>,
}

impl MessageInput {
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            timestamp: None,
        }
    }

    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub(crate) fn timestamp_nanos(&self) -> Result<i64, EncodeError> {
        self.timestamp
            .unwrap_or_else(Utc::now)
            .timestamp_nanos_opt()
            .ok_or(EncodeError::TimestampOutOfRange)
    }
}

/// A successfully decoded message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub payload: Vec<u8>,
    pub content_topic: ContentTopic,
    pub timestamp: Option<DateTime<Utc>>,
    pub version: u32,
    pub signature: Option<[u8; SIGNATURE_LEN]>,
    pub signature_public_key: Option<PublicKey>,
}

impl Message {
    pub(crate) fn from_envelope(envelope: &Envelope, payload: Vec<u8>) -> Self {
        Self {
            payload,
            content_topic: envelope.content_topic.clone(),
            timestamp: envelope.timestamp.map(|nanos| Utc.timestamp_nanos(nanos)),
            version: envelope.version,
            signature: None,
            signature_public_key: None,
        }
    }
}

/// Turns application payloads into envelopes for one content topic.
pub trait MessageEncoder: Send + Sync {
    fn content_topic(&self) -> &ContentTopic;

    fn to_envelope(&self, input: &MessageInput) -> Result<Envelope, EncodeError>;

    fn to_wire(&self, input: &MessageInput) -> Result<Vec<u8>, EncodeError> {
        self.to_envelope(input)?.to_bytes()
    }
}

/// Turns envelopes for one content topic back into messages.
pub trait MessageDecoder: Send + Sync {
    fn content_topic(&self) -> &ContentTopic;

    fn decode(&self, envelope: &Envelope) -> Result<Message, DecodeError>;

    fn from_wire(&self, bytes: &[u8]) -> Result<Message, DecodeError> {
        self.decode(&Envelope::from_bytes(bytes)?)
    }
}
