//! Length-prefixed zero padding applied to plaintext before encryption.
//!
//! ```text
//! [payload length: u32 BE][payload][zero bytes up to MIN_PADDED_LEN]
//! ```

use crate::CryptoError;

const LEN_PREFIX: usize = 4;

/// Smallest padded plaintext, so short messages all look alike on the wire.
pub const MIN_PADDED_LEN: usize = 256;

pub fn pad(payload: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let len = u32::try_from(payload.len()).map_err(|_| CryptoError::PayloadTooLarge(payload.len()))?;

    let total = payload
        .len()
        .checked_add(LEN_PREFIX)
        .ok_or(CryptoError::PayloadTooLarge(payload.len()))?
        .max(MIN_PADDED_LEN);

    let mut padded = Vec::with_capacity(total);
    padded.extend_from_slice(&len.to_be_bytes());
    padded.extend_from_slice(payload);
    padded.resize(total, 0);

    Ok(padded)
}

pub fn unpad(padded: &[u8]) -> Result<&[u8], CryptoError> {
    let Some((prefix, rest)) = padded.split_first_chunk::<LEN_PREFIX>() else {
        return Err(CryptoError::DecryptionFailed);
    };

    let len = usize::try_from(u32::from_be_bytes(*prefix))
        .map_err(|_| CryptoError::DecryptionFailed)?;

    rest.get(..len).ok_or(CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_payload_is_padded_to_minimum() -> eyre::Result<()> {
        let padded = pad(b"hi")?;

        assert_eq!(padded.len(), MIN_PADDED_LEN);
        assert_eq!(&padded[..6], &[0, 0, 0, 2, b'h', b'i']);
        assert_eq!(unpad(&padded)?, b"hi");

        Ok(())
    }

    #[test]
    fn test_long_payload_only_gets_prefix() -> eyre::Result<()> {
        let payload = vec![7; MIN_PADDED_LEN * 2];

        let padded = pad(&payload)?;

        assert_eq!(padded.len(), payload.len() + LEN_PREFIX);
        assert_eq!(unpad(&padded)?, payload.as_slice());

        Ok(())
    }

    #[test]
    fn test_empty_payload() -> eyre::Result<()> {
        assert_eq!(unpad(&pad(&[])?)?, b"");

        Ok(())
    }

    #[test]
    fn test_length_beyond_buffer_is_rejected() {
        assert!(unpad(&[0, 0, 0, 9, 1, 2]).is_err());
        assert!(unpad(&[0, 0]).is_err());
    }
}
