//! Plaintext envelopes.
//!
//! With a block size `b` configured the payload is laid out as
//!
//! ```text
//! [pad length: u8][payload][pad length zero bytes]
//! ```
//!
//! so the total is a multiple of `b`. Both sides must agree on `b`.

use waku_primitives::ContentTopic;

use crate::{DecodeError, EncodeError, Envelope, Message, MessageDecoder, MessageEncoder, MessageInput};

pub const VERSION: u32 = 0;

/// Largest block size whose padding length fits the one byte prefix.
pub const MAX_BLOCK_SIZE: usize = 256;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BlockSize(usize);

impl BlockSize {
    pub const fn new(size: usize) -> Result<Self, EncodeError> {
        if size == 0 || size > MAX_BLOCK_SIZE {
            return Err(EncodeError::InvalidBlockSize(size));
        }

        Ok(Self(size))
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

fn pad(payload: &[u8], block_size: BlockSize) -> Result<Vec<u8>, EncodeError> {
    let unpadded = payload.len().saturating_add(1);
    let pad_len = (block_size.0 - unpadded % block_size.0) % block_size.0;

    let prefix = u8::try_from(pad_len).map_err(|_| EncodeError::InvalidBlockSize(block_size.0))?;

    let mut padded = Vec::with_capacity(unpadded.saturating_add(pad_len));
    padded.push(prefix);
    padded.extend_from_slice(payload);
    padded.resize(unpadded.saturating_add(pad_len), 0);

    Ok(padded)
}

fn unpad(padded: &[u8], block_size: BlockSize) -> Result<Vec<u8>, DecodeError> {
    let Some((&pad_len, rest)) = padded.split_first() else {
        return Err(DecodeError::InvalidPadding);
    };

    if padded.len() % block_size.0 != 0 {
        return Err(DecodeError::InvalidPadding);
    }

    let Some(payload_len) = rest.len().checked_sub(usize::from(pad_len)) else {
        return Err(DecodeError::InvalidPadding);
    };

    let (payload, padding) = rest.split_at(payload_len);

    if padding.iter().any(|&byte| byte != 0) {
        return Err(DecodeError::InvalidPadding);
    }

    Ok(payload.to_vec())
}

#[derive(Clone, Debug)]
pub struct PlainEncoder {
    content_topic: ContentTopic,
    block_size: Option<BlockSize>,
}

impl PlainEncoder {
    #[must_use]
    pub const fn new(content_topic: ContentTopic) -> Self {
        Self {
            content_topic,
            block_size: None,
        }
    }

    #[must_use]
    pub const fn with_padding(mut self, block_size: BlockSize) -> Self {
        self.block_size = Some(block_size);
        self
    }
}

impl MessageEncoder for PlainEncoder {
    fn content_topic(&self) -> &ContentTopic {
        &self.content_topic
    }

    fn to_envelope(&self, input: &MessageInput) -> Result<Envelope, EncodeError> {
        let payload = match self.block_size {
            Some(block_size) => pad(&input.payload, block_size)?,
            None => input.payload.clone(),
        };

        Ok(Envelope {
            payload,
            content_topic: self.content_topic.clone(),
            version: VERSION,
            timestamp: Some(input.timestamp_nanos()?),
        })
    }
}

#[derive(Clone, Debug)]
pub struct PlainDecoder {
    content_topic: ContentTopic,
    block_size: Option<BlockSize>,
}

impl PlainDecoder {
    #[must_use]
    pub const fn new(content_topic: ContentTopic) -> Self {
        Self {
            content_topic,
            block_size: None,
        }
    }

    #[must_use]
    pub const fn with_padding(mut self, block_size: BlockSize) -> Self {
        self.block_size = Some(block_size);
        self
    }
}

impl MessageDecoder for PlainDecoder {
    fn content_topic(&self) -> &ContentTopic {
        &self.content_topic
    }

    fn decode(&self, envelope: &Envelope) -> Result<Message, DecodeError> {
        envelope.expect(&self.content_topic, VERSION)?;

        let payload = match self.block_size {
            Some(block_size) => unpad(&envelope.payload, block_size)?,
            None => envelope.payload.clone(),
        };

        Ok(Message::from_envelope(envelope, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_bounds() {
        assert!(BlockSize::new(0).is_err());
        assert!(BlockSize::new(1).is_ok());
        assert!(BlockSize::new(MAX_BLOCK_SIZE).is_ok());
        assert!(BlockSize::new(MAX_BLOCK_SIZE + 1).is_err());
    }

    #[test]
    fn test_pad_to_block_multiple() -> eyre::Result<()> {
        let block_size = BlockSize::new(16)?;

        for len in [0, 1, 14, 15, 16, 17, 100] {
            let payload = vec![0xab; len];

            let padded = pad(&payload, block_size)?;

            assert_eq!(padded.len() % 16, 0, "length {len} not padded to block");
            assert_eq!(unpad(&padded, block_size)?, payload);
        }

        Ok(())
    }

    #[test]
    fn test_max_block_size_prefix_fits() -> eyre::Result<()> {
        let block_size = BlockSize::new(MAX_BLOCK_SIZE)?;

        let padded = pad(&[], block_size)?;

        assert_eq!(padded.len(), MAX_BLOCK_SIZE);
        assert_eq!(padded[0], 255);

        Ok(())
    }

    #[test]
    fn test_unpad_rejects_bad_input() -> eyre::Result<()> {
        let block_size = BlockSize::new(4)?;

        assert!(unpad(&[], block_size).is_err());
        assert!(unpad(&[9, 0, 0, 0], block_size).is_err());
        assert!(unpad(&[2, 1, 0, 1], block_size).is_err());
        assert!(unpad(&[0, 1, 2], block_size).is_err());

        Ok(())
    }
}
