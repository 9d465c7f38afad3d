//! One client↔upstream relay session (spec.md §5's concurrency model: each
//! connection owns its `Connection` state; nothing is shared across
//! sessions except the immutable prefetched-atom seed and the trace sink).
//!
//! The wire bytes a session forwards are never rewritten except for the one
//! sanctioned mutation `decoder::replies` already computed (spec.md §9): a
//! denied extension's `QueryExtension` reply `present` byte. Everything else
//! passes through unchanged, byte for byte, in both directions.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use std::io::Write as _;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::decoder::byteorder::{ByteOrder, Reader, Truncated};
use crate::decoder::connection::{Connection, Direction};
use crate::decoder::dispatch::{decode_request, decode_server_message, DecodeOutcome};
use crate::decoder::setup;
use crate::error::{Error, Result};
use crate::relay::listener::TraceSink;
use crate::settings::Settings;

/// Either transport a client can arrive on or a session can dial upstream
/// over (SPEC_FULL.md §2: TCP and UNIX-domain, selected by the configured
/// endpoint's URI scheme).
pub enum Endpoint {
    Tcp(TcpStream),
    Unix(UnixStream),
}

impl AsyncRead for Endpoint {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Endpoint::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Endpoint::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Endpoint {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Endpoint::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Endpoint::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Endpoint::Tcp(s) => Pin::new(s).poll_flush(cx),
            Endpoint::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Endpoint::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Endpoint::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

async fn connect_upstream(settings: &Settings) -> Result<Endpoint> {
    let upstream = settings
        .upstream
        .clone()
        .ok_or_else(|| Error::Listen("no --upstream endpoint configured".into()))?;
    match upstream.scheme.as_str() {
        "tcp" => {
            let host = upstream.host.unwrap_or_else(|| "127.0.0.1".into());
            let port = upstream.port.unwrap_or(6000);
            let stream = TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| Error::Listen(format!("dial upstream tcp://{host}:{port}: {e}")))?;
            Ok(Endpoint::Tcp(stream))
        }
        "unix" => {
            let path = upstream.path.ok_or_else(|| Error::Listen("unix upstream missing path".into()))?;
            let stream = UnixStream::connect(&path)
                .await
                .map_err(|e| Error::Listen(format!("dial upstream unix://{}: {e}", path.display())))?;
            Ok(Endpoint::Unix(stream))
        }
        other => Err(Error::Listen(format!("unsupported upstream scheme {other}"))),
    }
}

/// Read the client's setup request incrementally: its length depends on
/// fields inside it (spec.md §4.8), so we grow the buffer and retry the
/// parse rather than precompute a size.
async fn read_setup_request<R: AsyncRead + Unpin>(
    read_half: &mut R,
    settings: &Settings,
) -> Result<(Vec<u8>, ByteOrder, String)> {
    let mut buf = Vec::new();
    loop {
        if !buf.is_empty() {
            let order = ByteOrder::from_marker(buf[0]).unwrap_or(ByteOrder::Little);
            let mut reader = Reader::new(&buf[1..], order);
            match setup::parse_setup_request(order, &mut reader, settings) {
                Ok((consumed, line, _req)) => return Ok((buf[..consumed].to_vec(), order, line)),
                Err(Truncated) => {}
            }
        }
        let mut chunk = [0u8; 512];
        let n = read_half.read(&mut chunk).await.map_err(Error::Io)?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "client closed during setup")));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Mirror of [`read_setup_request`] for the upstream server's reply.
async fn read_setup_reply<R: AsyncRead + Unpin>(
    read_half: &mut R,
    order: ByteOrder,
    settings: &Settings,
) -> Result<(Vec<u8>, String)> {
    let mut buf = Vec::new();
    loop {
        if !buf.is_empty() {
            let mut reader = Reader::new(&buf, order);
            match setup::parse_setup_reply(&mut reader, settings) {
                Ok((consumed, line)) => return Ok((buf[..consumed].to_vec(), line)),
                Err(Truncated) => {}
            }
        }
        let mut chunk = [0u8; 512];
        let n = read_half.read(&mut chunk).await.map_err(Error::Io)?;
        if n == 0 {
            return Err(Error::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "upstream closed during setup")));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

async fn write_trace(trace: &TraceSink, line: &str) {
    let mut writer = trace.lock().await;
    let _ = writeln!(writer, "{line}");
}

/// Decode and forward every complete message currently buffered, leaving any
/// trailing partial message for the next read (the `Incomplete` case of
/// [`DecodeOutcome`]).
async fn pump<R, W, F>(
    mut read_half: R,
    mut write_half: W,
    conn: Arc<Mutex<Connection>>,
    settings: Arc<Settings>,
    trace: TraceSink,
    decode: F,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    F: Fn(&mut Connection, &[u8], &Settings) -> DecodeOutcome + Send,
{
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        loop {
            if buf.is_empty() {
                break;
            }
            let outcome = {
                let mut c = conn.lock().await;
                decode(&mut c, &buf, &settings)
            };
            match outcome {
                DecodeOutcome::Parsed { bytes_parsed, line, patch } => {
                    if let Some((offset, value)) = patch {
                        if offset < bytes_parsed {
                            buf[offset] = value;
                        }
                    }
                    write_half.write_all(&buf[..bytes_parsed]).await.map_err(Error::Io)?;
                    write_trace(&trace, &line).await;
                    buf.drain(..bytes_parsed);
                }
                DecodeOutcome::Incomplete => break,
                DecodeOutcome::Resync { skip } => {
                    let skip = skip.clamp(1, buf.len());
                    warn!("resynced after {skip} undecodable byte(s)");
                    write_half.write_all(&buf[..skip]).await.map_err(Error::Io)?;
                    buf.drain(..skip);
                }
            }
        }
        let n = read_half.read(&mut chunk).await.map_err(Error::Io)?;
        if n == 0 {
            write_half.write_all(&buf).await.map_err(Error::Io)?;
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Run one session end to end: dial upstream, relay the connection-setup
/// handshake, seed the atom table from the pre-fetch helper, then pump both
/// directions concurrently until either side closes.
pub async fn run(
    id: u32,
    client: Endpoint,
    settings: Arc<Settings>,
    trace: TraceSink,
    prefetched_atoms: Arc<Vec<(u32, String)>>,
) -> Result<()> {
    let mut upstream = connect_upstream(&settings).await?;
    let (mut client_read, mut client_write) = tokio::io::split(client);

    let (setup_req_bytes, order, setup_req_line) = read_setup_request(&mut client_read, &settings).await?;
    upstream.write_all(&setup_req_bytes).await.map_err(Error::Io)?;
    write_trace(&trace, &format!("C{:03}:{:04}B:C->S:S00000: REQ Setup(0): {}", id, setup_req_bytes.len(), setup_req_line)).await;

    let (mut upstream_read, mut upstream_write) = tokio::io::split(upstream);
    let (setup_reply_bytes, setup_reply_line) = read_setup_reply(&mut upstream_read, order, &settings).await?;
    client_write.write_all(&setup_reply_bytes).await.map_err(Error::Io)?;
    write_trace(
        &trace,
        &format!("C{:03}:{:04}B:S->C:S00000: REP Setup(0): {}", id, setup_reply_bytes.len(), setup_reply_line),
    )
    .await;

    let mut conn = Connection::new(id);
    conn.set_byte_order(order);
    for (atom_id, name) in prefetched_atoms.iter() {
        conn.atoms.insert(*atom_id, name.clone());
    }
    let conn = Arc::new(Mutex::new(conn));

    let request_pump = pump(client_read, upstream_write, conn.clone(), settings.clone(), trace.clone(), |c, data, s| {
        decode_request(c, data, s)
    });
    let reply_pump = pump(upstream_read, client_write, conn.clone(), settings.clone(), trace.clone(), |c, data, s| {
        decode_server_message(c, data, s)
    });

    let result = tokio::try_join!(request_pump, reply_pump);

    let open_requests = conn.lock().await.open_request_count();
    match &result {
        Ok(_) => info!("connection {id} closed cleanly ({open_requests} request(s) left unanswered)"),
        Err(e) => debug!("connection {id} ended: {e}"),
    }
    result.map(|_| ())
}
