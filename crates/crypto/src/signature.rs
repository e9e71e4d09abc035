//! Recoverable secp256k1 signatures over the keccak256 digest of a payload.
//!
//! Encoded as `r || s || recovery_id`, 65 bytes.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use waku_primitives::utils::keccak256;

use crate::{CryptoError, PrivateKey, PublicKey};

pub const SIGNATURE_LEN: usize = 65;

pub fn sign(key: &PrivateKey, payload: &[u8]) -> Result<[u8; SIGNATURE_LEN], CryptoError> {
    let signing_key = SigningKey::from(key.as_secret());

    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&keccak256(payload))
        .map_err(|_| CryptoError::InvalidPrivateKey)?;

    let mut encoded = [0; SIGNATURE_LEN];
    let (rs, v) = encoded.split_at_mut(SIGNATURE_LEN - 1);
    rs.copy_from_slice(&signature.to_bytes());
    v[0] = recovery_id.to_byte();

    Ok(encoded)
}

/// Recovers the signer of `payload`.
pub fn recover(payload: &[u8], signature: &[u8]) -> Result<PublicKey, CryptoError> {
    let Some((&v, rs)) = signature.split_last() else {
        return Err(CryptoError::InvalidSignature);
    };

    if signature.len() != SIGNATURE_LEN {
        return Err(CryptoError::InvalidSignature);
    }

    let signature = Signature::from_slice(rs).map_err(|_| CryptoError::InvalidSignature)?;
    let recovery_id = RecoveryId::from_byte(v).ok_or(CryptoError::InvalidSignature)?;

    let verifying_key =
        VerifyingKey::recover_from_prehash(&keccak256(payload), &signature, recovery_id)
            .map_err(|_| CryptoError::InvalidSignature)?;

    Ok(PublicKey::from_point(verifying_key.into()))
}
