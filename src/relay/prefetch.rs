//! Atom pre-fetch helper (spec.md §6: "the host may, before the relay
//! begins, open its own connection to the upstream server and issue a
//! bounded sequence of GetAtomName requests to pre-populate the interned
//! atom table"). The decoder only exposes `AtomTable::insert`; this module
//! is the thing that drives it, entirely outside the decoder core.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::decoder::align::pad;
use crate::decoder::byteorder::{ByteOrder, Reader};
use crate::settings::{Settings, UpstreamSettingsConfig};

/// Best-effort: any failure (no upstream configured, refused, timed out)
/// degrades to an empty seed rather than blocking startup.
pub async fn prefetch(settings: &Settings) -> Vec<(u32, String)> {
    let Some(upstream) = settings.upstream.clone() else {
        return Vec::new();
    };
    if settings.prefetch_atoms == 0 {
        return Vec::new();
    }
    match timeout(Duration::from_secs(5), run(upstream, settings.prefetch_atoms)).await {
        Ok(Ok(atoms)) => {
            debug!("atom pre-fetch seeded {} name(s)", atoms.len());
            atoms
        }
        Ok(Err(e)) => {
            warn!("atom pre-fetch failed: {e}");
            Vec::new()
        }
        Err(_) => {
            warn!("atom pre-fetch timed out");
            Vec::new()
        }
    }
}

async fn run(upstream: UpstreamSettingsConfig, count: u32) -> std::io::Result<Vec<(u32, String)>> {
    match upstream.scheme.as_str() {
        "tcp" => {
            let host = upstream.host.unwrap_or_else(|| "127.0.0.1".into());
            let port = upstream.port.unwrap_or(6000);
            let stream = TcpStream::connect((host.as_str(), port)).await?;
            run_on(stream, count).await
        }
        "unix" => {
            let path = upstream
                .path
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "unix upstream missing path"))?;
            let stream = UnixStream::connect(&path).await?;
            run_on(stream, count).await
        }
        other => Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("unsupported upstream scheme {other}"))),
    }
}

/// Opens its own, throwaway X11 connection: a minimal little-endian setup
/// request with no authorization, then a bounded run of GetAtomName
/// requests for atom ids `1..=count`. Atoms the upstream server doesn't
/// recognize come back as a `Name` error and are simply skipped.
async fn run_on<S>(mut stream: S, count: u32) -> std::io::Result<Vec<(u32, String)>>
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    let setup_request: [u8; 12] = [ByteOrder::LITTLE_MARKER, 0, 11, 0, 0, 0, 0, 0, 0, 0, 0, 0];
    stream.write_all(&setup_request).await?;

    let mut setup_reply_header = [0u8; 8];
    stream.read_exact(&mut setup_reply_header).await?;
    if setup_reply_header[0] != 1 {
        debug!("upstream refused connection setup; skipping atom pre-fetch");
        return Ok(Vec::new());
    }
    let extra_units = u16::from_le_bytes([setup_reply_header[6], setup_reply_header[7]]) as usize;
    let mut rest = vec![0u8; extra_units * 4];
    stream.read_exact(&mut rest).await?;

    let mut atoms = Vec::new();
    for atom_id in 1..=count {
        stream.write_all(&get_atom_name_request(atom_id)).await?;

        let mut reply = [0u8; 32];
        stream.read_exact(&mut reply).await?;
        if reply[0] != 1 {
            continue; // a Name/Atom error for this id: not every id is in use
        }
        let mut r = Reader::new(&reply[8..], ByteOrder::Little);
        let name_len = r.read_u16().unwrap_or(0) as usize;

        let padded = pad(name_len);
        let mut name_bytes = vec![0u8; padded];
        if padded > 0 {
            stream.read_exact(&mut name_bytes).await?;
        }
        let name: String = name_bytes[..name_len].iter().map(|&b| b as char).collect();
        if !name.is_empty() {
            atoms.push((atom_id, name));
        }
    }

    Ok(atoms)
}

fn get_atom_name_request(atom_id: u32) -> [u8; 8] {
    let mut req = [0u8; 8];
    req[0] = 17; // GetAtomName
    req[2..4].copy_from_slice(&2u16.to_le_bytes());
    req[4..8].copy_from_slice(&atom_id.to_le_bytes());
    req
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_atom_name_request_is_eight_bytes_requesting_one_atom() {
        let req = get_atom_name_request(39);
        assert_eq!(req[0], 17);
        assert_eq!(u32::from_le_bytes([req[4], req[5], req[6], req[7]]), 39);
    }
}
