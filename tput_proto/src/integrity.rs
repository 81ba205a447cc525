use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Renders a byte slice as lower-case hex.
pub fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// SHA-256 digest of `bytes`, as a 64-character lower-case hex
/// string. This is the integrity token exchanged on both transports.
pub fn digest_hex(bytes: &[u8]) -> String {
    hex_string(&Sha256::digest(bytes))
}

/// True when `bytes` hashes to exactly `expected`. String equality,
/// no partial matching: one flipped payload bit fails the check.
pub fn verify(expected: &str, bytes: &[u8]) -> bool {
    digest_hex(bytes) == expected
}
