//! Byte layout of a version 1 payload.
//!
//! ```text
//! [flags: u8]
//! [ephemeral public key: 65 bytes]   asymmetric only
//! [iv: 12 bytes]
//! [ciphertext || tag]
//! [signature: 65 bytes]              signed only
//! ```
//!
//! The flags byte and the ephemeral key are bound to the ciphertext as
//! associated data, so neither the scheme nor the presence of a signature
//! can be altered without failing authentication.

use crate::signature::{self, SIGNATURE_LEN};
use crate::{aead, ecies, padding, CryptoError, Iv, PrivateKey, PublicKey, SymmetricKey};
use crate::{IV_LEN, PUBLIC_KEY_LEN, TAG_LEN};

const FLAG_ASYMMETRIC: u8 = 0b0000_0001;
const FLAG_SIGNED: u8 = 0b0000_0100;
const KNOWN_FLAGS: u8 = FLAG_ASYMMETRIC | FLAG_SIGNED;

/// Plaintext recovered from a version 1 payload.
#[derive(Clone, Debug)]
pub struct Decrypted {
    pub payload: Vec<u8>,
    pub signature: Option<[u8; SIGNATURE_LEN]>,
    /// Signer recovered from `signature`.
    pub signer: Option<PublicKey>,
}

pub fn encrypt_symmetric(
    key: &SymmetricKey,
    payload: &[u8],
    signer: Option<&PrivateKey>,
) -> Result<Vec<u8>, CryptoError> {
    seal(key, 0, None, payload, signer)
}

pub fn encrypt_asymmetric(
    recipient: &PublicKey,
    payload: &[u8],
    signer: Option<&PrivateKey>,
) -> Result<Vec<u8>, CryptoError> {
    let (ephemeral, key) = ecies::sender_key(recipient)?;

    seal(&key, FLAG_ASYMMETRIC, Some(&ephemeral), payload, signer)
}

pub fn decrypt_symmetric(key: &SymmetricKey, data: &[u8]) -> Result<Decrypted, CryptoError> {
    let parsed = Parsed::new(data)?;

    if parsed.ephemeral.is_some() {
        return Err(CryptoError::DecryptionFailed);
    }

    parsed.open(key)
}

pub fn decrypt_asymmetric(
    private_key: &PrivateKey,
    data: &[u8],
) -> Result<Decrypted, CryptoError> {
    let parsed = Parsed::new(data)?;

    let Some(ephemeral) = parsed.ephemeral else {
        return Err(CryptoError::DecryptionFailed);
    };

    let ephemeral = PublicKey::from_bytes(ephemeral).map_err(|_| CryptoError::DecryptionFailed)?;
    let key = ecies::recipient_key(private_key, &ephemeral)?;

    parsed.open(&key)
}

fn seal(
    key: &SymmetricKey,
    scheme: u8,
    ephemeral: Option<&PublicKey>,
    payload: &[u8],
    signer: Option<&PrivateKey>,
) -> Result<Vec<u8>, CryptoError> {
    let flags = if signer.is_some() {
        scheme | FLAG_SIGNED
    } else {
        scheme
    };

    let mut header = vec![flags];
    if let Some(ephemeral) = ephemeral {
        header.extend_from_slice(&ephemeral.to_bytes());
    }

    let iv = aead::random_iv();
    let cipher_text = aead::seal(key, iv, &header, padding::pad(payload)?)?;

    let mut out = header;
    out.extend_from_slice(&iv);
    out.extend(cipher_text);

    if let Some(signer) = signer {
        out.extend_from_slice(&signature::sign(signer, payload)?);
    }

    Ok(out)
}

struct Parsed<'a> {
    header: &'a [u8],
    ephemeral: Option<&'a [u8]>,
    iv: Iv,
    cipher_text: &'a [u8],
    signature: Option<&'a [u8]>,
}

impl<'a> Parsed<'a> {
    fn new(data: &'a [u8]) -> Result<Self, CryptoError> {
        let Some(&flags) = data.first() else {
            return Err(CryptoError::DecryptionFailed);
        };

        if flags & !KNOWN_FLAGS != 0 {
            return Err(CryptoError::DecryptionFailed);
        }

        let header_len = if flags & FLAG_ASYMMETRIC == 0 {
            1
        } else {
            1 + PUBLIC_KEY_LEN
        };

        let signature_len = if flags & FLAG_SIGNED == 0 {
            0
        } else {
            SIGNATURE_LEN
        };

        if data.len() < header_len + IV_LEN + TAG_LEN + signature_len {
            return Err(CryptoError::DecryptionFailed);
        }

        let (header, rest) = data.split_at(header_len);
        let (iv, rest) = rest.split_at(IV_LEN);
        let (cipher_text, signature) = rest.split_at(rest.len() - signature_len);

        Ok(Self {
            header,
            ephemeral: header.get(1..).filter(|key| !key.is_empty()),
            iv: iv.try_into().map_err(|_| CryptoError::DecryptionFailed)?,
            cipher_text,
            signature: (!signature.is_empty()).then_some(signature),
        })
    }

    fn open(self, key: &SymmetricKey) -> Result<Decrypted, CryptoError> {
        let padded = aead::open(key, self.iv, self.header, self.cipher_text.to_vec())?;
        let payload = padding::unpad(&padded)?.to_vec();

        let Some(signature) = self.signature else {
            return Ok(Decrypted {
                payload,
                signature: None,
                signer: None,
            });
        };

        let signer = signature::recover(&payload, signature)?;

        Ok(Decrypted {
            payload,
            signature: Some(
                signature
                    .try_into()
                    .map_err(|_| CryptoError::InvalidSignature)?,
            ),
            signer: Some(signer),
        })
    }
}
