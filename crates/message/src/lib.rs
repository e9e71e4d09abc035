//! Message envelopes and their codecs.
//!
//! Every encoder and decoder is bound to exactly one [`ContentTopic`]. A
//! decoder refuses envelopes for any other topic, which is what lets the
//! protocol clients try every registered decoder against an incoming
//! envelope and treat failures as "not mine".
//!
//! - [`version_0`]: plaintext, optionally padded to a block size
//! - [`version_1`]: AES-256-GCM under a symmetric key or an ECIES-derived key
//!
//! Content topic and timestamp travel outside the ciphertext in both
//! versions.
//!
//! [`ContentTopic`]: waku_primitives::ContentTopic

use std::io;

use thiserror::Error;
use waku_crypto::CryptoError;
use waku_primitives::ContentTopic;

pub mod codec;
mod envelope;
mod message;
pub mod version_0;
pub mod version_1;

pub use codec::{decode, encode, DecryptionParams, EncryptionParams};
pub use envelope::Envelope;
pub use message::{Message, MessageDecoder, MessageEncoder, MessageInput};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodeError {
    #[error("invalid padding block size {0}, expected 1..={}", version_0::MAX_BLOCK_SIZE)]
    InvalidBlockSize(usize),
    #[error("timestamp is outside the representable range")]
    TimestampOutOfRange,
    #[error("failed to serialize envelope")]
    Serialize(#[source] io::Error),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("malformed envelope")]
    Malformed(#[source] io::Error),
    #[error("content topic mismatch: expected {expected}, got {found}")]
    ContentTopicMismatch {
        expected: ContentTopic,
        found: ContentTopic,
    },
    #[error("unsupported version: expected {expected}, got {found}")]
    UnsupportedVersion { expected: u32, found: u32 },
    #[error("invalid padding")]
    InvalidPadding,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("invalid or unexpected signature")]
    InvalidSignature,
}

impl From<CryptoError> for DecodeError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidSignature => Self::InvalidSignature,
            _ => Self::DecryptionFailed,
        }
    }
}
