//! Raw stream-transport test server.
//!
//! One command line per connection: the client sends a verb, the
//! server runs the matching flow and closes. Each accepted socket is
//! handled on its own task; the only shared state is the stats
//! registry.

use crate::clock::unix_now;
use crate::stats::{SessionGuard, TestStats, Transport};
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpListener;
use tracing::{debug, info};
use tput_proto::{
    digest_hex, generate, PayloadKind, TestCommand, DEFAULT_CHUNK_SIZE, MAX_COMMAND_LINE,
};

/// Accept loop. Runs until the listener fails; individual session
/// errors never take the server down.
pub async fn run(listener: TcpListener, stats: Arc<TestStats>) -> Result<()> {
    info!("Stream transport listening on {}", listener.local_addr()?);
    loop {
        let (socket, address) = listener.accept().await?;
        let stats = stats.clone();
        tokio::spawn(async move {
            debug!("Stream connection from {address:?}");
            let mut session = stats.begin_session(Transport::Stream, Some(address));
            if let Err(e) = handle_session(socket, &mut session).await {
                // Peer went away or spoke garbage; the session guard
                // still releases the connection count.
                debug!("Stream session from {address:?} ended early: {e:?}");
            }
        });
    }
}

/// Runs one session: read a command line, dispatch, close. Generic
/// over the stream so tests can drive it with in-memory pipes.
pub(crate) async fn handle_session<S>(stream: S, session: &mut SessionGuard) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    let n = (&mut reader)
        .take(MAX_COMMAND_LINE as u64)
        .read_line(&mut line)
        .await?;
    if n == 0 {
        // Connected and left without saying anything.
        return Ok(());
    }

    match TestCommand::parse(line.trim()) {
        Ok(TestCommand::Throughput { size, chunk_size }) => {
            throughput_flow(&mut writer, session, size, chunk_size).await
        }
        Ok(TestCommand::Ping { client_ts }) => ping_flow(&mut writer, client_ts).await,
        Ok(TestCommand::Upload { expected }) => {
            upload_flow(&mut reader, &mut writer, session, expected).await
        }
        Err(e) => {
            writer.write_all(format!("ERROR: {e}\n").as_bytes()).await?;
            Ok(())
        }
    }
}

/// `THROUGHPUT_START`/`HASH` lines, then the payload in `chunk_size`
/// writes, then `THROUGHPUT_END`. The digest goes out before the
/// data so the client can verify what it received.
async fn throughput_flow<W>(
    writer: &mut W,
    session: &mut SessionGuard,
    size: usize,
    chunk_size: usize,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let start = format!("THROUGHPUT_START {size} {chunk_size} {}\n", unix_now());
    writer.write_all(start.as_bytes()).await?;

    let payload = generate(size, PayloadKind::Random);
    let hash = digest_hex(&payload);
    writer.write_all(format!("HASH {hash}\n").as_bytes()).await?;

    for chunk in payload.chunks(chunk_size) {
        if let Err(e) = writer.write_all(chunk).await {
            if is_disconnect(&e) {
                // Client-driven early termination, not a failure.
                debug!("Peer closed mid-transfer");
                return Ok(());
            }
            return Err(e.into());
        }
    }
    writer.write_all(b"THROUGHPUT_END\n").await?;

    session.record_bytes(size as u64);
    Ok(())
}

/// `PONG <client_ts> <server_ts>`. Without a client timestamp the
/// server's own is echoed in both positions as an approximation.
async fn ping_flow<W>(writer: &mut W, client_ts: Option<f64>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let server_ts = unix_now();
    let client_ts = client_ts.unwrap_or(server_ts);
    writer
        .write_all(format!("PONG {client_ts} {server_ts}\n").as_bytes())
        .await?;
    Ok(())
}

/// `READY`, then read until `expected` bytes or the peer closes.
/// A short read is a truncated upload, reported as-is, not an error.
async fn upload_flow<R, W>(
    reader: &mut R,
    writer: &mut W,
    session: &mut SessionGuard,
    expected: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(b"READY\n").await?;

    let mut received = Vec::with_capacity(expected.min(DEFAULT_CHUNK_SIZE * 16));
    let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];
    while received.len() < expected {
        let want = buf.len().min(expected - received.len());
        match reader.read(&mut buf[..want]).await {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(e) if is_disconnect(&e) => break,
            Err(e) => return Err(e.into()),
        }
    }

    let hash = digest_hex(&received);
    writer
        .write_all(format!("UPLOAD_COMPLETE {} {hash}\n", received.len()).as_bytes())
        .await?;
    session.record_bytes(received.len() as u64);
    Ok(())
}

pub(crate) fn is_disconnect(e: &std::io::Error) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        e.kind(),
        BrokenPipe | ConnectionReset | ConnectionAborted | UnexpectedEof | WriteZero
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tput_proto::verify;

    async fn run_session(client_bytes: &[u8], stats: &Arc<TestStats>) -> Vec<u8> {
        let (mut client, server) = duplex(4 * 1024 * 1024);
        let stats = stats.clone();
        let task = tokio::spawn(async move {
            let mut session = stats.begin_session(Transport::Stream, None);
            handle_session(server, &mut session).await
        });
        client.write_all(client_bytes).await.unwrap();
        client.shutdown().await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        task.await.unwrap().unwrap();
        response
    }

    fn split_line(buf: &[u8]) -> (String, &[u8]) {
        let pos = buf.iter().position(|b| *b == b'\n').expect("missing newline");
        (
            String::from_utf8(buf[..pos].to_vec()).unwrap(),
            &buf[pos + 1..],
        )
    }

    #[tokio::test]
    async fn throughput_frames_and_digest_line_up() {
        let stats = Arc::new(TestStats::new());
        let response = run_session(b"THROUGHPUT 4096 512\n", &stats).await;

        let (start, rest) = split_line(&response);
        let tokens: Vec<&str> = start.split_whitespace().collect();
        assert_eq!(tokens[0], "THROUGHPUT_START");
        assert_eq!(tokens[1], "4096");
        assert_eq!(tokens[2], "512");
        assert!(tokens[3].parse::<f64>().unwrap() > 0.0);

        let (hash_line, rest) = split_line(rest);
        let hash = hash_line.strip_prefix("HASH ").unwrap();
        assert_eq!(hash.len(), 64);

        let payload = &rest[..4096];
        assert!(verify(hash, payload));
        assert_eq!(&rest[4096..], b"THROUGHPUT_END\n");

        let snap = stats.snapshot();
        assert_eq!(snap.total_bytes_sent, 4096);
        assert_eq!(snap.active_connections, 0);
    }

    #[tokio::test]
    async fn throughput_zero_size_sends_framing_only() {
        let stats = Arc::new(TestStats::new());
        let response = run_session(b"THROUGHPUT 0\n", &stats).await;
        let (start, rest) = split_line(&response);
        assert!(start.starts_with("THROUGHPUT_START 0 "));
        let (hash_line, rest) = split_line(rest);
        assert!(hash_line.starts_with("HASH "));
        assert_eq!(rest, b"THROUGHPUT_END\n");
        assert_eq!(stats.snapshot().total_bytes_sent, 0);
    }

    #[tokio::test]
    async fn ping_echoes_client_timestamp() {
        let stats = Arc::new(TestStats::new());
        let response = run_session(b"PING 1723741000.25\n", &stats).await;
        let line = String::from_utf8(response).unwrap();
        assert!(line.starts_with("PONG 1723741000.25 "));
        let server_ts: f64 = line
            .trim_end()
            .rsplit(' ')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(server_ts > 1_600_000_000.0);
    }

    #[tokio::test]
    async fn ping_without_timestamp_uses_server_clock() {
        let stats = Arc::new(TestStats::new());
        let response = run_session(b"PING\n", &stats).await;
        let line = String::from_utf8(response).unwrap();
        let tokens: Vec<&str> = line.trim_end().split(' ').collect();
        assert_eq!(tokens[0], "PONG");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1], tokens[2]);
    }

    #[tokio::test]
    async fn truncated_upload_reports_received_bytes() {
        let stats = Arc::new(TestStats::new());
        let (mut client, server) = duplex(64 * 1024);
        let task_stats = stats.clone();
        let task = tokio::spawn(async move {
            let mut session = task_stats.begin_session(Transport::Stream, None);
            handle_session(server, &mut session).await
        });

        client.write_all(b"UPLOAD 100\n").await.unwrap();
        let mut ready = [0u8; 6];
        client.read_exact(&mut ready).await.unwrap();
        assert_eq!(&ready, b"READY\n");

        // Send only 60 of the promised 100 bytes, then hang up.
        let sent = vec![0x5A; 60];
        client.write_all(&sent).await.unwrap();
        client.shutdown().await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        task.await.unwrap().unwrap();

        let line = String::from_utf8(response).unwrap();
        let tokens: Vec<&str> = line.trim_end().split(' ').collect();
        assert_eq!(tokens[0], "UPLOAD_COMPLETE");
        assert_eq!(tokens[1], "60");
        assert!(verify(tokens[2], &sent));
        assert_eq!(stats.snapshot().total_bytes_sent, 60);
    }

    #[tokio::test]
    async fn full_upload_digests_everything() {
        let stats = Arc::new(TestStats::new());
        let (mut client, server) = duplex(64 * 1024);
        let task_stats = stats.clone();
        let task = tokio::spawn(async move {
            let mut session = task_stats.begin_session(Transport::Stream, None);
            handle_session(server, &mut session).await
        });

        client.write_all(b"UPLOAD 1000\n").await.unwrap();
        let mut ready = [0u8; 6];
        client.read_exact(&mut ready).await.unwrap();

        let sent: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        client.write_all(&sent).await.unwrap();

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        task.await.unwrap().unwrap();

        let line = String::from_utf8(response).unwrap();
        let tokens: Vec<&str> = line.trim_end().split(' ').collect();
        assert_eq!(tokens[1], "1000");
        assert!(verify(tokens[2], &sent));
    }

    #[tokio::test]
    async fn unknown_command_gets_error_line() {
        let stats = Arc::new(TestStats::new());
        let response = run_session(b"MAKE COFFEE\n", &stats).await;
        assert_eq!(response, b"ERROR: Unknown command\n");
        let snap = stats.snapshot();
        assert_eq!(snap.active_connections, 0);
        assert_eq!(snap.total_connections, 1);
    }

    #[tokio::test]
    async fn immediate_disconnect_still_releases_session() {
        let stats = Arc::new(TestStats::new());
        let response = run_session(b"", &stats).await;
        assert!(response.is_empty());
        let snap = stats.snapshot();
        assert_eq!(snap.active_connections, 0);
        assert_eq!(snap.total_connections, 1);
    }
}
