//! Encrypted envelopes. See [`waku_crypto::envelope`] for the payload
//! layout.

use waku_crypto::{Decrypted, PrivateKey, PublicKey, SymmetricKey};
use waku_primitives::ContentTopic;

use crate::{DecodeError, EncodeError, Envelope, Message, MessageDecoder, MessageEncoder, MessageInput};

pub const VERSION: u32 = 1;

fn into_message(
    envelope: &Envelope,
    decrypted: Decrypted,
    expected_signer: Option<&PublicKey>,
) -> Result<Message, DecodeError> {
    if let Some(expected) = expected_signer {
        if decrypted.signer.as_ref() != Some(expected) {
            return Err(DecodeError::InvalidSignature);
        }
    }

    Ok(Message {
        signature: decrypted.signature,
        signature_public_key: decrypted.signer,
        ..Message::from_envelope(envelope, decrypted.payload)
    })
}

#[derive(Clone, Debug)]
pub struct SymmetricEncoder {
    content_topic: ContentTopic,
    key: SymmetricKey,
    signer: Option<PrivateKey>,
}

impl SymmetricEncoder {
    #[must_use]
    pub const fn new(content_topic: ContentTopic, key: SymmetricKey) -> Self {
        Self {
            content_topic,
            key,
            signer: None,
        }
    }

    #[must_use]
    pub fn with_signer(mut self, signer: PrivateKey) -> Self {
        self.signer = Some(signer);
        self
    }
}

impl MessageEncoder for SymmetricEncoder {
    fn content_topic(&self) -> &ContentTopic {
        &self.content_topic
    }

    fn to_envelope(&self, input: &MessageInput) -> Result<Envelope, EncodeError> {
        Ok(Envelope {
            payload: waku_crypto::encrypt_symmetric(&self.key, &input.payload, self.signer.as_ref())?,
            content_topic: self.content_topic.clone(),
            version: VERSION,
            timestamp: Some(input.timestamp_nanos()?),
        })
    }
}

#[derive(Clone, Debug)]
pub struct SymmetricDecoder {
    content_topic: ContentTopic,
    key: SymmetricKey,
    expected_signer: Option<PublicKey>,
}

impl SymmetricDecoder {
    #[must_use]
    pub const fn new(content_topic: ContentTopic, key: SymmetricKey) -> Self {
        Self {
            content_topic,
            key,
            expected_signer: None,
        }
    }

    /// Rejects messages not signed by `signer`.
    #[must_use]
    pub const fn with_expected_signer(mut self, signer: PublicKey) -> Self {
        self.expected_signer = Some(signer);
        self
    }
}

impl MessageDecoder for SymmetricDecoder {
    fn content_topic(&self) -> &ContentTopic {
        &self.content_topic
    }

    fn decode(&self, envelope: &Envelope) -> Result<Message, DecodeError> {
        envelope.expect(&self.content_topic, VERSION)?;

        let decrypted = waku_crypto::decrypt_symmetric(&self.key, &envelope.payload)?;

        into_message(envelope, decrypted, self.expected_signer.as_ref())
    }
}

#[derive(Clone, Debug)]
pub struct AsymmetricEncoder {
    content_topic: ContentTopic,
    recipient: PublicKey,
    signer: Option<PrivateKey>,
}

impl AsymmetricEncoder {
    #[must_use]
    pub const fn new(content_topic: ContentTopic, recipient: PublicKey) -> Self {
        Self {
            content_topic,
            recipient,
            signer: None,
        }
    }

    #[must_use]
    pub fn with_signer(mut self, signer: PrivateKey) -> Self {
        self.signer = Some(signer);
        self
    }
}

impl MessageEncoder for AsymmetricEncoder {
    fn content_topic(&self) -> &ContentTopic {
        &self.content_topic
    }

    fn to_envelope(&self, input: &MessageInput) -> Result<Envelope, EncodeError> {
        Ok(Envelope {
            payload: waku_crypto::encrypt_asymmetric(
                &self.recipient,
                &input.payload,
                self.signer.as_ref(),
            )?,
            content_topic: self.content_topic.clone(),
            version: VERSION,
            timestamp: Some(input.timestamp_nanos()?),
        })
    }
}

#[derive(Clone, Debug)]
pub struct AsymmetricDecoder {
    content_topic: ContentTopic,
    private_key: PrivateKey,
    expected_signer: Option<PublicKey>,
}

impl AsymmetricDecoder {
    #[must_use]
    pub const fn new(content_topic: ContentTopic, private_key: PrivateKey) -> Self {
        Self {
            content_topic,
            private_key,
            expected_signer: None,
        }
    }

    /// Rejects messages not signed by `signer`.
    #[must_use]
    pub const fn with_expected_signer(mut self, signer: PublicKey) -> Self {
        self.expected_signer = Some(signer);
        self
    }
}

impl MessageDecoder for AsymmetricDecoder {
    fn content_topic(&self) -> &ContentTopic {
        &self.content_topic
    }

    fn decode(&self, envelope: &Envelope) -> Result<Message, DecodeError> {
        envelope.expect(&self.content_topic, VERSION)?;

        let decrypted = waku_crypto::decrypt_asymmetric(&self.private_key, &envelope.payload)?;

        into_message(envelope, decrypted, self.expected_signer.as_ref())
    }
}
