//! Accept loop (SPEC_FULL.md §2/§3): binds the configured listen endpoint
//! and spawns one relay session per accepted client, each dialing upstream
//! independently. A dial failure or decode error closes only that one
//! session; the listener itself keeps running until a shutdown signal
//! arrives (SPEC_FULL.md §2's graceful SIGINT/SIGTERM requirement).

use std::sync::Arc;

use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::relay::session::{self, Endpoint};
use crate::settings::{OutputSettings, Settings};

pub type TraceSink = Arc<Mutex<Box<dyn std::io::Write + Send>>>;

pub fn open_trace_sink(settings: &Settings) -> Result<TraceSink> {
    let writer: Box<dyn std::io::Write + Send> = match &settings.output {
        OutputSettings::Stdout => Box::new(std::io::stdout()),
        OutputSettings::File(path) => Box::new(std::fs::File::create(path).map_err(Error::Io)?),
    };
    Ok(Arc::new(Mutex::new(writer)))
}

/// Run the accept loop until a shutdown signal is observed.
pub async fn run(settings: Arc<Settings>, prefetched_atoms: Arc<Vec<(u32, String)>>) -> Result<()> {
    let trace = open_trace_sink(&settings)?;
    let listen = settings.listen.clone().ok_or_else(|| Error::Listen("no --listen endpoint configured".into()))?;

    let mut next_id: u32 = 1;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    match listen.scheme.as_str() {
        "tcp" => {
            let host = listen.host.clone().unwrap_or_else(|| "127.0.0.1".into());
            let port = listen.port.unwrap_or(6000);
            let listener =
                TcpListener::bind((host.as_str(), port)).await.map_err(|e| Error::Listen(format!("bind tcp://{host}:{port}: {e}")))?;
            info!("listening on tcp://{host}:{port}");
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("shutdown signal received, no longer accepting new connections");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            let id = next_id;
                            next_id += 1;
                            info!("accepted connection {id} from {peer}");
                            spawn_session(id, Endpoint::Tcp(stream), settings.clone(), trace.clone(), prefetched_atoms.clone());
                        }
                        Err(e) => error!("accept failed: {e}"),
                    },
                }
            }
        }
        "unix" => {
            let path = listen.path.clone().ok_or_else(|| Error::Listen("unix listen endpoint missing path".into()))?;
            let _ = std::fs::remove_file(&path);
            let listener = UnixListener::bind(&path).map_err(|e| Error::Listen(format!("bind unix://{}: {e}", path.display())))?;
            info!("listening on unix://{}", path.display());
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("shutdown signal received, no longer accepting new connections");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            let id = next_id;
                            next_id += 1;
                            info!("accepted connection {id}");
                            spawn_session(id, Endpoint::Unix(stream), settings.clone(), trace.clone(), prefetched_atoms.clone());
                        }
                        Err(e) => error!("accept failed: {e}"),
                    },
                }
            }
        }
        other => return Err(Error::Listen(format!("unsupported listen scheme {other}"))),
    }

    Ok(())
}

fn spawn_session(id: u32, client: Endpoint, settings: Arc<Settings>, trace: TraceSink, prefetched_atoms: Arc<Vec<(u32, String)>>) {
    tokio::spawn(async move {
        if let Err(e) = session::run(id, client, settings, trace, prefetched_atoms).await {
            error!("connection {id} ended with error: {e}");
        }
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
