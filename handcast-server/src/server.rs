//! Broadcast server: accept consumers, publish every encoded frame to all of
//! them, prune the ones that fail.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use handcast_core::wire::{encode_frame, EncodeError};
use handcast_core::Frame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::registry::{ConnectionHandle, Registry};

/// Broadcast tuning knobs; see [`crate::config::Config`] for the file/env
/// surface that feeds these.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Frames a consumer may fall behind before being disconnected.
    pub max_queued_frames: usize,
    /// Bounded wait for each socket write.
    pub write_timeout: Duration,
    /// Bounded wait for each accept, so shutdown is observed promptly.
    pub accept_timeout: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_queued_frames: 32,
            write_timeout: Duration::from_secs(1),
            accept_timeout: Duration::from_secs(1),
        }
    }
}

/// Owns the listening socket and the set of consumer connections.
/// Frames a disconnected consumer missed are gone; a reconnect starts from
/// the next published frame.
pub struct BroadcastServer {
    registry: Registry,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl BroadcastServer {
    /// Bind the listening endpoint and start the accept loop.
    pub async fn bind(addr: SocketAddr, opts: ServerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let registry = Registry::new();
        let running = Arc::new(AtomicBool::new(true));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            registry.clone(),
            running.clone(),
            opts,
        ));
        info!(%local_addr, "listening");
        Ok(Self {
            registry,
            local_addr,
            running,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn client_count(&self) -> usize {
        self.registry.len().await
    }

    /// Publish one frame to every registered connection. Encodes once and
    /// enqueues onto each connection's bounded queue; a full queue means the
    /// consumer fell behind its bound and it is disconnected. Returns the
    /// number of connections the frame was queued for.
    pub async fn publish(&self, frame: &Frame) -> Result<usize, EncodeError> {
        let encoded = Bytes::from(encode_frame(frame)?);
        let mut delivered = 0;
        for (id, tx) in self.registry.snapshot().await {
            match tx.try_send(encoded.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    if let Some(handle) = self.registry.remove(id).await {
                        warn!(addr = %handle.addr, "send queue full, dropping slow consumer");
                        handle.task.abort();
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    // Connection task already tearing itself down.
                    self.registry.remove(id).await;
                }
            }
        }
        Ok(delivered)
    }

    /// Stop accepting, drop every connection, close the listener.
    pub async fn shutdown(self) {
        self.running.store(false, Ordering::Relaxed);
        self.accept_task.abort();
        let _ = self.accept_task.await;
        for handle in self.registry.clear().await {
            handle.task.abort();
        }
        info!("server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    registry: Registry,
    running: Arc<AtomicBool>,
    opts: ServerOptions,
) {
    while running.load(Ordering::Relaxed) {
        match timeout(opts.accept_timeout, listener.accept()).await {
            // Bounded wait elapsed; re-check the running flag and retry.
            Err(_) => continue,
            Ok(Ok((stream, addr))) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(%addr, error = %e, "failed to set TCP_NODELAY");
                }
                let id = registry.next_id();
                let (tx, rx) = mpsc::channel(opts.max_queued_frames);
                let task = tokio::spawn(run_connection(
                    id,
                    stream,
                    addr,
                    rx,
                    registry.clone(),
                    opts.write_timeout,
                ));
                // If the task exits before this insert lands, the stale
                // entry is reaped by the next publish (queue shows closed).
                registry.insert(id, ConnectionHandle { addr, tx, task }).await;
                info!(%addr, "consumer connected");
            }
            Ok(Err(e)) => {
                error!(error = %e, "accept failed, stopping accept loop");
                break;
            }
        }
    }
}

/// Per-connection task: owns the socket, drains the send queue, and watches
/// the read half so a consumer that hangs up is deregistered immediately
/// instead of on the next failed write.
async fn run_connection(
    id: u64,
    stream: TcpStream,
    addr: SocketAddr,
    mut rx: mpsc::Receiver<Bytes>,
    registry: Registry,
    write_timeout: Duration,
) {
    let (mut read_half, mut write_half) = stream.into_split();
    // The protocol is one-way; inbound bytes are only read to notice EOF.
    let mut close_buf = [0u8; 512];
    loop {
        tokio::select! {
            queued = rx.recv() => match queued {
                Some(bytes) => match timeout(write_timeout, write_half.write_all(&bytes)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(%addr, error = %e, "write failed");
                        break;
                    }
                    Err(_) => {
                        debug!(%addr, "write timed out");
                        break;
                    }
                },
                // Queue closed: server shutdown or eviction.
                None => break,
            },
            read = read_half.read(&mut close_buf) => match read {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            },
        }
    }
    if registry.remove(id).await.is_some() {
        info!(%addr, "consumer disconnected");
    }
    // Socket halves drop here, closing the connection exactly once.
}
