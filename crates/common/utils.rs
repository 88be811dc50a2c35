use crate::H256;
use bytes::Bytes;
use hex::FromHexError;
use sha3::Digest;
use sha3::Keccak256;

pub fn decode_hex(hex: &str) -> Result<Vec<u8>, FromHexError> {
    let trimmed = hex.strip_prefix("0x").unwrap_or(hex);
    hex::decode(trimmed)
}

pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256(Keccak256::digest(data.as_ref()).into())
}

/// Copies the contents of `bytes` into a freshly allocated buffer.
///
/// `Bytes::clone` only bumps a reference count, so the clone shares its backing
/// storage with the original. Transaction copies must never alias buffers.
pub fn copy_bytes(bytes: &Bytes) -> Bytes {
    Bytes::copy_from_slice(bytes)
}

/// Interprets a big endian byte string as an unsigned integer.
/// Returns `None` when the value does not fit in 64 bits.
pub fn u64_from_big_endian(bytes: &[u8]) -> Option<u64> {
    let first_non_zero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let significant = &bytes[first_non_zero..];
    if significant.len() > 8 {
        return None;
    }
    let mut padded = [0u8; 8];
    padded[8 - significant.len()..].copy_from_slice(significant);
    Some(u64::from_be_bytes(padded))
}
