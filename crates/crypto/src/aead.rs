//! AES-256-GCM with a caller-supplied 96 bit IV and associated data.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;

use crate::{CryptoError, Iv, SymmetricKey, IV_LEN};

#[must_use]
pub fn random_iv() -> Iv {
    let mut iv = [0; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

fn cipher(key: &SymmetricKey) -> Result<aead::LessSafeKey, CryptoError> {
    aead::UnboundKey::new(&aead::AES_256_GCM, key.as_bytes())
        .map(aead::LessSafeKey::new)
        .map_err(|_| CryptoError::InvalidSymmetricKey)
}

/// Returns `ciphertext || tag`.
pub fn seal(
    key: &SymmetricKey,
    iv: Iv,
    aad: &[u8],
    plaintext: Vec<u8>,
) -> Result<Vec<u8>, CryptoError> {
    let mut cipher_text = plaintext;

    cipher(key)?
        .seal_in_place_append_tag(
            aead::Nonce::assume_unique_for_key(iv),
            aead::Aad::from(aad),
            &mut cipher_text,
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok(cipher_text)
}

/// Fails closed: a tag mismatch never yields partial plaintext.
pub fn open(
    key: &SymmetricKey,
    iv: Iv,
    aad: &[u8],
    cipher_text: Vec<u8>,
) -> Result<Vec<u8>, CryptoError> {
    let mut payload = cipher_text;

    let decrypted_len = cipher(key)?
        .open_in_place(
            aead::Nonce::assume_unique_for_key(iv),
            aead::Aad::from(aad),
            &mut payload,
        )
        .map_err(|_| CryptoError::DecryptionFailed)?
        .len();

    payload.truncate(decrypted_len);

    Ok(payload)
}
