//! Mapping between upstream turn identifiers and client-facing `chatcmpl-` ids.
//!
//! The encoded body is 24 bytes rendered as 32 base64 characters: the first
//! 8 bytes carry the upstream id (big-endian) when it is a canonical decimal
//! `u64`, otherwise the first 8 digest bytes; the remaining 16 bytes are
//! SHA-256 digest bytes of the id string. `+`, `/` and `=` are replaced with
//! `x`, `y` and `z`, which collide with real base64 letters, so decoding
//! tries every reading of the ambiguous characters and keeps the candidate
//! whose re-encoding reproduces the input.
//!
//! Ids are not opaque: the leading characters of an id derived from a numeric
//! upstream turn id spell out that number in base64.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

pub const CHAT_ID_PREFIX: &str = "chatcmpl-";

const BODY_LEN: usize = 32;
/// Base64 characters covering the 8 leading id bytes (rounded up to a quantum).
const HEAD_LEN: usize = 12;
/// Only the first 11 characters contribute bits to the leading 8 bytes.
const SIGNIFICANT_HEAD: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatIdError {
    #[error("chat id does not start with '{CHAT_ID_PREFIX}'")]
    MissingPrefix,
    #[error("chat id body is not {BODY_LEN} alphanumeric characters")]
    Malformed,
    #[error("chat id does not encode a numeric upstream id")]
    NotReversible,
}

/// Encode an upstream identifier into a client-facing chat id.
pub fn encode(upstream_id: &str) -> String {
    let digest = Sha256::digest(upstream_id.as_bytes());

    let mut payload = [0u8; 24];
    match upstream_id.parse::<u64>() {
        Ok(n) if n.to_string() == upstream_id => payload[..8].copy_from_slice(&n.to_be_bytes()),
        _ => payload[..8].copy_from_slice(&digest[..8]),
    }
    payload[8..].copy_from_slice(&digest[8..24]);

    let body: String = STANDARD
        .encode(payload)
        .chars()
        .map(|c| match c {
            '+' => 'x',
            '/' => 'y',
            '=' => 'z',
            other => other,
        })
        .take(BODY_LEN)
        .collect();

    format!("{CHAT_ID_PREFIX}{body}")
}

/// Recover the numeric upstream id from a client-facing chat id.
///
/// Never panics; callers treat an error as "unknown", not as id zero.
pub fn decode(chat_id: &str) -> Result<u64, ChatIdError> {
    let body = chat_id
        .strip_prefix(CHAT_ID_PREFIX)
        .ok_or(ChatIdError::MissingPrefix)?;
    if body.len() != BODY_LEN || !body.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ChatIdError::Malformed);
    }

    let head: Vec<u8> = body.as_bytes()[..HEAD_LEN].to_vec();
    let ambiguous: Vec<usize> = head[..SIGNIFICANT_HEAD]
        .iter()
        .enumerate()
        .filter(|(_, b)| matches!(b, b'x' | b'y'))
        .map(|(i, _)| i)
        .collect();

    for mask in 0u32..(1u32 << ambiguous.len()) {
        let mut candidate = head.clone();
        for (bit, &pos) in ambiguous.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                candidate[pos] = if candidate[pos] == b'x' { b'+' } else { b'/' };
            }
        }
        let Ok(bytes) = STANDARD.decode(&candidate) else {
            continue;
        };
        let mut leading = [0u8; 8];
        leading.copy_from_slice(&bytes[..8]);
        let id = u64::from_be_bytes(leading);
        if encode(&id.to_string()) == chat_id {
            return Ok(id);
        }
    }

    Err(ChatIdError::NotReversible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_shape() {
        let id = encode("1894067233817206784");
        assert!(id.starts_with(CHAT_ID_PREFIX));
        let body = &id[CHAT_ID_PREFIX.len()..];
        assert_eq!(body.len(), 32);
        assert!(body.bytes().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_numeric_id_is_readable_from_prefix() {
        // 1 as big-endian u64 is seven zero bytes then 0x01.
        assert!(encode("1").starts_with("chatcmpl-AAAAAAAAAA"));
        assert!(!encode("turn-1").starts_with("chatcmpl-AAAAAAAAAA"));
    }

    #[test]
    fn test_encode_is_deterministic() {
        assert_eq!(encode("42"), encode("42"));
        assert_ne!(encode("42"), encode("43"));
        assert_eq!(encode("not-a-number"), encode("not-a-number"));
    }

    #[test]
    fn test_round_trip_numeric_ids() {
        let ids = [
            0u64,
            1,
            42,
            1_740_000_000_000,
            1_894_067_233_817_206_784,
            u64::MAX,
            u64::MAX / 3,
            0xF8F8_F8F8_F8F8_F8F8,
            0xFBEF_BEFB_EFBE_FBEF,
        ];
        for id in ids {
            assert_eq!(decode(&encode(&id.to_string())), Ok(id), "id {id}");
        }
    }

    #[test]
    fn test_round_trip_sweep() {
        let mut id = 7u64;
        for _ in 0..2000 {
            id = id.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            assert_eq!(decode(&encode(&id.to_string())), Ok(id));
        }
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert_eq!(decode("hello"), Err(ChatIdError::MissingPrefix));
        assert_eq!(decode("chatcmpl-short"), Err(ChatIdError::Malformed));
        assert_eq!(
            decode("chatcmpl-++++++++++++++++++++++++++++++++"),
            Err(ChatIdError::Malformed)
        );
        assert_eq!(decode(""), Err(ChatIdError::MissingPrefix));
    }

    #[test]
    fn test_decode_non_numeric_origin_is_not_reversible() {
        assert_eq!(
            decode(&encode("turn-abc")),
            Err(ChatIdError::NotReversible)
        );
        assert_eq!(decode(&encode("007")), Err(ChatIdError::NotReversible));
    }
}
