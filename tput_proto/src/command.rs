use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_TEST_SIZE, DEFAULT_UPLOAD_SIZE, MAX_TEST_SIZE};
use thiserror::Error;

/// One parsed command line from a stream-transport client.
///
/// The grammar is a single ASCII line, newline terminated:
///
/// ```text
/// THROUGHPUT [<size>] [<chunk_size>]
/// PING [<client_ts>]
/// UPLOAD <expected_size>
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum TestCommand {
    /// Server streams a random payload of `size` bytes in
    /// `chunk_size` writes.
    Throughput { size: usize, chunk_size: usize },
    /// Echo test. The client may include its own send timestamp so
    /// it can compute round-trip time from the reply.
    Ping { client_ts: Option<f64> },
    /// Client streams `expected` bytes; the server digests whatever
    /// actually arrived.
    Upload { expected: usize },
}

impl TestCommand {
    /// Parses one trimmed command line. Defaults are filled in for
    /// omitted arguments; sizes are bounds-checked against
    /// [`MAX_TEST_SIZE`].
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut tokens = line.split_ascii_whitespace();
        let verb = tokens.next().ok_or(CommandError::UnknownCommand)?;
        match verb {
            "THROUGHPUT" => {
                let size = parse_size(tokens.next(), DEFAULT_TEST_SIZE)?;
                let chunk_size = parse_size(tokens.next(), DEFAULT_CHUNK_SIZE)?;
                if chunk_size == 0 {
                    return Err(CommandError::InvalidArgument);
                }
                Ok(TestCommand::Throughput { size, chunk_size })
            }
            "PING" => {
                let client_ts = match tokens.next() {
                    Some(t) => {
                        Some(t.parse::<f64>().map_err(|_| CommandError::InvalidArgument)?)
                    }
                    None => None,
                };
                Ok(TestCommand::Ping { client_ts })
            }
            "UPLOAD" => {
                let expected = parse_size(tokens.next(), DEFAULT_UPLOAD_SIZE)?;
                Ok(TestCommand::Upload { expected })
            }
            _ => Err(CommandError::UnknownCommand),
        }
    }
}

fn parse_size(token: Option<&str>, default: usize) -> Result<usize, CommandError> {
    let Some(token) = token else {
        return Ok(default);
    };
    let size = token
        .parse::<usize>()
        .map_err(|_| CommandError::InvalidArgument)?;
    if size > MAX_TEST_SIZE {
        return Err(CommandError::SizeTooLarge);
    }
    Ok(size)
}

/// Reasons a command line can be rejected. The `Display` text is
/// what goes back to the client after the `ERROR: ` prefix.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    /// The line did not begin with a recognized verb.
    #[error("Unknown command")]
    UnknownCommand,
    /// An argument was present but would not parse.
    #[error("Invalid command argument")]
    InvalidArgument,
    /// A requested size exceeded [`MAX_TEST_SIZE`].
    #[error("Requested size too large")]
    SizeTooLarge,
}
