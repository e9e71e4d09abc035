use borsh::{BorshDeserialize, BorshSerialize};
use waku_primitives::ContentTopic;

use crate::{DecodeError, EncodeError};

/// Wire form of a message, as relayed, pushed and stored.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, Eq, PartialEq)]
pub struct Envelope {
    pub payload: Vec<u8>,
    pub content_topic: ContentTopic,
    pub version: u32,
    /// Unix nanoseconds.
    pub timestamp: Option<i64>,
}

impl Envelope {
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        borsh::to_vec(self).map_err(EncodeError::Serialize)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        borsh::from_slice(bytes).map_err(DecodeError::Malformed)
    }

    pub(crate) fn expect(&self, content_topic: &ContentTopic, version: u32) -> Result<(), DecodeError> {
        if &self.content_topic != content_topic {
            return Err(DecodeError::ContentTopicMismatch {
                expected: content_topic.clone(),
                found: self.content_topic.clone(),
            });
        }

        if self.version != version {
            return Err(DecodeError::UnsupportedVersion {
                expected: version,
                found: self.version,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_bytes_are_malformed() -> eyre::Result<()> {
        let envelope = Envelope {
            payload: b"hello".to_vec(),
            content_topic: "/app/1/test".into(),
            version: 0,
            timestamp: None,
        };

        let mut bytes = envelope.to_bytes()?;
        assert_eq!(Envelope::from_bytes(&bytes)?, envelope);

        bytes.push(0);
        assert!(matches!(
            Envelope::from_bytes(&bytes),
            Err(DecodeError::Malformed(_))
        ));

        Ok(())
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(Envelope::from_bytes(&[0xff; 3]).is_err());
        assert!(Envelope::from_bytes(&[]).is_err());
    }
}
