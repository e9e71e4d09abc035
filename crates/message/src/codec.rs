//! One-shot encode and decode without holding an encoder or decoder.
//!
//! The envelope version follows from the parameters: [`EncryptionParams::Plain`]
//! produces version 0, the keyed variants produce version 1.

use waku_crypto::{PrivateKey, PublicKey, SymmetricKey};
use waku_primitives::ContentTopic;

use crate::version_0::{BlockSize, PlainDecoder, PlainEncoder};
use crate::version_1::{AsymmetricDecoder, AsymmetricEncoder, SymmetricDecoder, SymmetricEncoder};
use crate::{
    DecodeError, EncodeError, Envelope, Message, MessageDecoder, MessageEncoder, MessageInput,
};

#[derive(Clone, Debug)]
pub enum EncryptionParams {
    Plain {
        padding: Option<BlockSize>,
    },
    Symmetric {
        key: SymmetricKey,
        signer: Option<PrivateKey>,
    },
    Asymmetric {
        recipient: PublicKey,
        signer: Option<PrivateKey>,
    },
}

#[derive(Clone, Debug)]
pub enum DecryptionParams {
    Plain { padding: Option<BlockSize> },
    Symmetric { key: SymmetricKey },
    Asymmetric { private_key: PrivateKey },
}

impl EncryptionParams {
    #[must_use]
    pub fn encoder(&self, content_topic: ContentTopic) -> Box<dyn MessageEncoder> {
        match self {
            Self::Plain { padding } => {
                let encoder = PlainEncoder::new(content_topic);
                Box::new(match padding {
                    Some(block_size) => encoder.with_padding(*block_size),
                    None => encoder,
                })
            }
            Self::Symmetric { key, signer } => {
                let encoder = SymmetricEncoder::new(content_topic, key.clone());
                Box::new(match signer {
                    Some(signer) => encoder.with_signer(signer.clone()),
                    None => encoder,
                })
            }
            Self::Asymmetric { recipient, signer } => {
                let encoder = AsymmetricEncoder::new(content_topic, *recipient);
                Box::new(match signer {
                    Some(signer) => encoder.with_signer(signer.clone()),
                    None => encoder,
                })
            }
        }
    }
}

impl DecryptionParams {
    #[must_use]
    pub fn decoder(&self, content_topic: ContentTopic) -> Box<dyn MessageDecoder> {
        match self {
            Self::Plain { padding } => {
                let decoder = PlainDecoder::new(content_topic);
                Box::new(match padding {
                    Some(block_size) => decoder.with_padding(*block_size),
                    None => decoder,
                })
            }
            Self::Symmetric { key } => Box::new(SymmetricDecoder::new(content_topic, key.clone())),
            Self::Asymmetric { private_key } => {
                Box::new(AsymmetricDecoder::new(content_topic, private_key.clone()))
            }
        }
    }
}

/// Encodes `input` into envelope bytes for `content_topic`.
pub fn encode(
    content_topic: ContentTopic,
    input: &MessageInput,
    params: &EncryptionParams,
) -> Result<Vec<u8>, EncodeError> {
    params.encoder(content_topic).to_wire(input)
}

/// Decodes envelope bytes, accepting whichever content topic they carry.
pub fn decode(bytes: &[u8], params: &DecryptionParams) -> Result<Message, DecodeError> {
    let envelope = Envelope::from_bytes(bytes)?;

    params
        .decoder(envelope.content_topic.clone())
        .decode(&envelope)
}
