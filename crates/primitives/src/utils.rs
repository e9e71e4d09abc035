//! Conversions between strings, hex and raw bytes.

use sha3::{Digest, Keccak256};

#[must_use]
pub fn utf8_to_bytes(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

/// Lossy: invalid sequences become U+FFFD.
#[must_use]
pub fn bytes_to_utf8(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Accepts an optional `0x` prefix.
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
}

#[must_use]
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip_with_prefix() {
        assert_eq!(hex_to_bytes("0x00ff10").expect("valid hex"), [0x00, 0xff, 0x10]);
        assert_eq!(hex_to_bytes("00ff10").expect("valid hex"), [0x00, 0xff, 0x10]);
        assert_eq!(bytes_to_hex(&[0x00, 0xff, 0x10]), "00ff10");
        assert!(hex_to_bytes("0xzz").is_err());
    }

    #[test]
    fn test_utf8() {
        assert_eq!(bytes_to_utf8(&utf8_to_bytes("hello")), "hello");
        assert_eq!(bytes_to_utf8(&[0xff]), "\u{fffd}");
    }

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            bytes_to_hex(&keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
