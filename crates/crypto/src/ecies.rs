//! Key agreement for the asymmetric scheme.
//!
//! The sender generates a one-off secp256k1 keypair, runs ECDH against the
//! recipient's public key, and expands the shared x-coordinate with
//! HKDF-SHA256 into an AES-256-GCM key. The ephemeral public key travels
//! with the ciphertext so the recipient can repeat the agreement.

use hkdf::Hkdf;
use k256::ecdh::{diffie_hellman, EphemeralSecret, SharedSecret};
use rand::rngs::OsRng;
use sha2::Sha256;

use crate::{CryptoError, PrivateKey, PublicKey, SymmetricKey, SYMMETRIC_KEY_LEN};

const KDF_INFO: &[u8] = b"waku/ecies/v1";

fn derive_key(shared: &SharedSecret) -> Result<SymmetricKey, CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(None, shared.raw_secret_bytes());

    let mut key = [0; SYMMETRIC_KEY_LEN];
    hkdf.expand(KDF_INFO, &mut key)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    Ok(SymmetricKey::from(key))
}

/// Sender side: returns the ephemeral public key to transmit and the
/// derived key to encrypt with.
pub fn sender_key(recipient: &PublicKey) -> Result<(PublicKey, SymmetricKey), CryptoError> {
    let ephemeral = EphemeralSecret::random(&mut OsRng);
    let shared = ephemeral.diffie_hellman(recipient.as_point());

    Ok((
        PublicKey::from_point(ephemeral.public_key()),
        derive_key(&shared)?,
    ))
}

/// Recipient side: re-derives the sender's key from the transmitted
/// ephemeral public key.
pub fn recipient_key(
    private_key: &PrivateKey,
    ephemeral: &PublicKey,
) -> Result<SymmetricKey, CryptoError> {
    let shared = diffie_hellman(
        private_key.as_secret().to_nonzero_scalar(),
        ephemeral.as_point().as_affine(),
    );

    derive_key(&shared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_private_key;

    #[test]
    fn test_both_sides_agree() -> eyre::Result<()> {
        let recipient = generate_private_key();

        let (ephemeral, sender) = sender_key(&recipient.public_key())?;
        let derived = recipient_key(&recipient, &ephemeral)?;

        assert_eq!(sender.as_bytes(), derived.as_bytes());

        Ok(())
    }

    #[test]
    fn test_unrelated_key_disagrees() -> eyre::Result<()> {
        let recipient = generate_private_key();

        let (ephemeral, sender) = sender_key(&recipient.public_key())?;
        let derived = recipient_key(&generate_private_key(), &ephemeral)?;

        assert_ne!(sender.as_bytes(), derived.as_bytes());

        Ok(())
    }

    #[test]
    fn test_ephemeral_key_changes_per_call() -> eyre::Result<()> {
        let recipient = generate_private_key().public_key();

        let (first, _) = sender_key(&recipient)?;
        let (second, _) = sender_key(&recipient)?;

        assert_ne!(first, second);

        Ok(())
    }
}
