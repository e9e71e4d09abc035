//! Cryptography behind version 1 envelopes.
//!
//! Payloads are sealed with AES-256-GCM, either under a pre-shared
//! [`SymmetricKey`] or under a key derived from an ephemeral secp256k1
//! key agreement with the recipient's [`PublicKey`]. Either mode can carry a
//! recoverable signature from a separate signing key.

use thiserror::Error;

pub mod aead;
pub mod ecies;
pub mod envelope;
mod keys;
pub mod padding;
pub mod signature;

pub use envelope::{decrypt_asymmetric, decrypt_symmetric, encrypt_asymmetric, encrypt_symmetric, Decrypted};
pub use keys::{
    generate_private_key, generate_symmetric_key, get_public_key, PrivateKey, PublicKey,
    SymmetricKey, PRIVATE_KEY_LEN, PUBLIC_KEY_LEN, SYMMETRIC_KEY_LEN,
};

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

pub type Iv = [u8; IV_LEN];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CryptoError {
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid public key: expected a 65 byte uncompressed secp256k1 point")]
    InvalidPublicKey,
    #[error("invalid symmetric key: expected {SYMMETRIC_KEY_LEN} bytes")]
    InvalidSymmetricKey,
    #[error("invalid or mismatched signature")]
    InvalidSignature,
    #[error("payload of {0} bytes is too large to encrypt")]
    PayloadTooLarge(usize),
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
}
