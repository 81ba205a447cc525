use rand::RngCore;

/// Marker tiled across pattern payloads. A receiver that knows the
/// marker can locate the exact offset at which a lossy or corrupting
/// middlebox damaged the stream.
pub const TEST_PATTERN: &[u8] = b"THROUGHPUT_TEST_PATTERN_";

/// Which kind of test payload to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadKind {
    /// Cryptographically-strong random bytes. Incompressible, so
    /// throughput numbers are not flattered by compressing proxies.
    Random,
    /// Deterministic marker tiling, for loss/corruption localization.
    Pattern,
}

/// Produces a test payload of exactly `size` bytes.
///
/// `Pattern` output is a pure function of `size`: the same length
/// always yields identical bytes. `size = 0` returns an empty buffer
/// for either kind.
pub fn generate(size: usize, kind: PayloadKind) -> Vec<u8> {
    match kind {
        PayloadKind::Random => {
            let mut data = vec![0u8; size];
            rand::thread_rng().fill_bytes(&mut data);
            data
        }
        PayloadKind::Pattern => {
            let mut data = Vec::with_capacity(size);
            while data.len() + TEST_PATTERN.len() <= size {
                data.extend_from_slice(TEST_PATTERN);
            }
            data.extend_from_slice(&TEST_PATTERN[..size - data.len()]);
            data
        }
    }
}

/// Returns the first offset at which `bytes` stops matching the
/// pattern tiling, or `None` if the whole buffer is intact. This is
/// the receiver-side half of a pattern test: the offset tells you
/// where on the wire the damage began.
pub fn first_pattern_break(bytes: &[u8]) -> Option<usize> {
    bytes
        .iter()
        .enumerate()
        .find(|(i, b)| **b != TEST_PATTERN[i % TEST_PATTERN.len()])
        .map(|(i, _)| i)
}
