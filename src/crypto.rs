//! Digest primitives for CampusChain
//!
//! Block hashes are SHA-256 over a canonical encoding of the four header
//! fields in fixed order: `index`, `timestamp`, `prev_hash`, `payload`.
//! Integers are written fixed-width (big-endian) and strings are prefixed
//! with their byte length, so two distinct tuples can never produce the same
//! hash input.

use sha2::{Digest, Sha256};

/// Hex-encoded digest length (256 bits).
pub const DIGEST_HEX_LEN: usize = 64;

/// Domain tag mixed into every block hash.
const BLOCK_DOMAIN: &[u8] = b"campuschain.block.v1";

/// Append a length-prefixed byte string to the canonical buffer.
fn push_field(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Canonical hash input for a block header.
pub fn canonical_block_bytes(index: u64, timestamp: i64, prev_hash: &str, payload: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        BLOCK_DOMAIN.len() + 8 + 8 + 8 + prev_hash.len() + 8 + payload.len() + 8,
    );
    push_field(&mut buf, BLOCK_DOMAIN);
    buf.extend_from_slice(&index.to_be_bytes());
    buf.extend_from_slice(&timestamp.to_be_bytes());
    push_field(&mut buf, prev_hash.as_bytes());
    push_field(&mut buf, payload.as_bytes());
    buf
}

/// SHA-256 of arbitrary bytes, lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Digest of a block header.
pub fn block_digest(index: u64, timestamp: i64, prev_hash: &str, payload: &str) -> String {
    sha256_hex(&canonical_block_bytes(index, timestamp, prev_hash, payload))
}

/// True if `s` looks like a digest produced by [`block_digest`].
pub fn is_digest(s: &str) -> bool {
    s.len() == DIGEST_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
