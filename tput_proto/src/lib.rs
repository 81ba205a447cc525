//! Shared protocol definitions for the `tput` throughput test tools.
//!
//! Everything a server or client needs to speak the stream-transport
//! test protocol lives here: the command grammar, the test payload
//! generators and the integrity digest helpers. The daemon (`tputd`)
//! and any test clients depend on this crate so the wire format is
//! defined exactly once.

mod command;
mod integrity;
mod payload;

pub use command::{CommandError, TestCommand};
pub use integrity::{digest_hex, hex_string, verify};
pub use payload::{first_pattern_break, generate, PayloadKind, TEST_PATTERN};

/// Default number of bytes streamed by a download test.
pub const DEFAULT_TEST_SIZE: usize = 2 * 1024 * 1024;

/// Default size for the simpler single-shot test variant.
pub const SIMPLE_TEST_SIZE: usize = 1024 * 1024;

/// Default write size for chunked payload streaming.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Default expected byte count for an `UPLOAD` with no size argument.
pub const DEFAULT_UPLOAD_SIZE: usize = 1024;

/// Upper bound on any single test payload, download or upload. The
/// payload is materialized in memory before it is streamed, so the
/// size has to be capped somewhere sane.
pub const MAX_TEST_SIZE: usize = 256 * 1024 * 1024;

/// Longest command line a stream-transport client may send.
pub const MAX_COMMAND_LINE: usize = 1024;
