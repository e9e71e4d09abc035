use core::fmt;

use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CryptoError;

pub const PRIVATE_KEY_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 65;
pub const SYMMETRIC_KEY_LEN: usize = 32;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// A secp256k1 secret scalar.
#[derive(Clone)]
pub struct PrivateKey(k256::SecretKey);

impl PrivateKey {
    pub fn random<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        Self(k256::SecretKey::random(rng))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(CryptoError::InvalidPrivateKey);
        }

        k256::SecretKey::from_slice(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPrivateKey)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_LEN] {
        self.0.to_bytes().into()
    }

    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.public_key())
    }

    pub(crate) const fn as_secret(&self) -> &k256::SecretKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey").field(&"..").finish()
    }
}

/// A secp256k1 point, exchanged in its 65 byte uncompressed form.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct PublicKey(k256::PublicKey);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBLIC_KEY_LEN || bytes.first() != Some(&UNCOMPRESSED_TAG) {
            return Err(CryptoError::InvalidPublicKey);
        }

        k256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let point = self.0.to_encoded_point(false);

        let mut bytes = [0; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(point.as_bytes());
        bytes
    }

    pub(crate) const fn as_point(&self) -> &k256::PublicKey {
        &self.0
    }

    pub(crate) const fn from_point(point: k256::PublicKey) -> Self {
        Self(point)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&hex::encode(self.to_bytes())).finish()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&hex::encode(self.to_bytes()))
    }
}

/// A 256 bit AEAD key. Zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_LEN]);

impl SymmetricKey {
    pub fn random<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let mut key = [0; SYMMETRIC_KEY_LEN];
        rng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| CryptoError::InvalidSymmetricKey)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.0
    }
}

impl From<[u8; SYMMETRIC_KEY_LEN]> for SymmetricKey {
    fn from(key: [u8; SYMMETRIC_KEY_LEN]) -> Self {
        Self(key)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SymmetricKey").field(&"..").finish()
    }
}

#[must_use]
pub fn generate_private_key() -> PrivateKey {
    PrivateKey::random(&mut OsRng)
}

#[must_use]
pub fn generate_symmetric_key() -> SymmetricKey {
    SymmetricKey::random(&mut OsRng)
}

#[must_use]
pub fn get_public_key(private_key: &PrivateKey) -> PublicKey {
    private_key.public_key()
}
