//! Streaming client: background receive loop feeding a latest-frame cell.
//!
//! Latest-value semantics by design: each decoded frame overwrites the
//! previous one, so a consumer polling slower than the producer publishes
//! skips older frames instead of queueing them.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use handcast_core::wire::decode_payload;
use handcast_core::{Frame, StreamReader};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::debug;

/// Matches the read chunk the original consumers pulled per recv.
const READ_BUF_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bounded wait for the initial connect.
    pub connect_timeout: Duration,
    /// Bounded wait per socket read; elapsing is a retry, not an error, and
    /// is the interval within which disconnect requests are observed.
    pub read_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(100),
        }
    }
}

/// Socket-level connect failure. Reported to the caller, never retried
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("connect failed: {0}")]
    Failed(#[from] std::io::Error),
    #[error("connect timed out")]
    TimedOut,
}

/// Why the receive loop stopped. Reconnection is the caller's decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisconnectReason {
    /// Peer shut down, detected via a zero-length read.
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// Length prefix or payload failed to decode. A corrupted
    /// length-prefixed stream has no resynchronization point.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("read error: {0}")]
    Io(String),
    /// Local `disconnect()` call.
    #[error("disconnect requested")]
    Requested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStatus {
    Connected,
    Disconnected(DisconnectReason),
}

/// Handle to a running receive loop. Dropping the handle requests
/// disconnection; the loop tears down within one bounded-wait interval.
pub struct StreamingClient {
    latest: watch::Receiver<Option<Frame>>,
    status: watch::Receiver<ClientStatus>,
    running: Arc<AtomicBool>,
}

impl StreamingClient {
    /// Connect and start the background receive loop.
    pub async fn connect(addr: SocketAddr, cfg: ClientConfig) -> Result<Self, ConnectError> {
        let stream = timeout(cfg.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectError::TimedOut)??;
        stream.set_nodelay(true)?;

        let (latest_tx, latest_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(ClientStatus::Connected);
        let running = Arc::new(AtomicBool::new(true));
        tokio::spawn(receive_loop(
            stream,
            cfg.read_timeout,
            latest_tx,
            status_tx,
            running.clone(),
        ));
        Ok(Self {
            latest: latest_rx,
            status: status_rx,
            running,
        })
    }

    /// Most recently decoded frame, if any has arrived yet. The stored
    /// frame stays readable after disconnection.
    pub fn latest(&self) -> Option<Frame> {
        self.latest.borrow().clone()
    }

    /// A change-notified view of the latest-frame cell, for consumers that
    /// want to await new frames rather than poll.
    pub fn updates(&self) -> watch::Receiver<Option<Frame>> {
        self.latest.clone()
    }

    pub fn status(&self) -> ClientStatus {
        self.status.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.status(), ClientStatus::Connected)
    }

    /// Request disconnection. Idempotent and safe to call concurrently with
    /// the receive loop tearing itself down.
    pub fn disconnect(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Wait until the receive loop has stopped and return why.
    pub async fn wait_disconnected(&mut self) -> DisconnectReason {
        loop {
            if let ClientStatus::Disconnected(reason) = self.status.borrow_and_update().clone() {
                return reason;
            }
            if self.status.changed().await.is_err() {
                return DisconnectReason::Io("receive loop vanished".to_string());
            }
        }
    }
}

impl Drop for StreamingClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn receive_loop(
    mut stream: TcpStream,
    read_timeout: Duration,
    latest: watch::Sender<Option<Frame>>,
    status: watch::Sender<ClientStatus>,
    running: Arc<AtomicBool>,
) {
    let mut reader = StreamReader::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    let reason = loop {
        if !running.load(Ordering::Relaxed) {
            break DisconnectReason::Requested;
        }
        let n = match timeout(read_timeout, stream.read(&mut buf)).await {
            // Bounded wait elapsed: no data yet, retry.
            Err(_) => continue,
            Ok(Ok(0)) => break DisconnectReason::ConnectionClosed,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => break DisconnectReason::Io(e.to_string()),
        };
        reader.feed(&buf[..n]);
        if let Err(reason) = drain_frames(&mut reader, &latest) {
            break reason;
        }
    };
    drop(stream);
    debug!(%reason, "receive loop stopped");
    let _ = status.send(ClientStatus::Disconnected(reason));
}

/// Decode every complete frame currently buffered, overwriting the cell.
fn drain_frames(
    reader: &mut StreamReader,
    latest: &watch::Sender<Option<Frame>>,
) -> Result<(), DisconnectReason> {
    loop {
        match reader.next_frame() {
            Ok(Some(payload)) => match decode_payload(&payload) {
                Ok(frame) => {
                    let _ = latest.send(Some(frame));
                }
                Err(e) => return Err(DisconnectReason::MalformedFrame(e.to_string())),
            },
            Ok(None) => return Ok(()),
            Err(e) => return Err(DisconnectReason::MalformedFrame(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handcast_core::wire::encode_frame;
    use handcast_core::{Hand, Landmark, LANDMARKS_PER_HAND};
    use handcast_server::{BroadcastServer, ServerOptions};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    fn test_frame(x: f64) -> Frame {
        let hand = Hand::new([Landmark::new(x, 0.5, 0.0); LANDMARKS_PER_HAND]);
        Frame::pose_only(vec![hand])
    }

    fn fast_config() -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_millis(50),
        }
    }

    async fn bind_server() -> BroadcastServer {
        BroadcastServer::bind("127.0.0.1:0".parse().unwrap(), ServerOptions::default())
            .await
            .unwrap()
    }

    async fn wait_for_clients(server: &BroadcastServer, n: usize) {
        timeout(Duration::from_secs(2), async {
            while server.client_count().await != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {n} clients"));
    }

    async fn wait_for_latest(client: &StreamingClient, expected: &Frame) {
        timeout(Duration::from_secs(2), async {
            loop {
                if client.latest().as_ref() == Some(expected) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("latest frame never matched");
    }

    #[tokio::test]
    async fn connect_to_nothing_fails() {
        // Bind-then-drop to get a port with no listener.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(StreamingClient::connect(addr, fast_config()).await.is_err());
    }

    #[tokio::test]
    async fn latest_value_overwrites_older_frames() {
        let server = bind_server().await;
        let client = StreamingClient::connect(server.local_addr(), fast_config())
            .await
            .unwrap();
        wait_for_clients(&server, 1).await;

        let f1 = test_frame(0.1);
        let f2 = test_frame(0.2);
        let f3 = test_frame(0.3);
        // Publish faster than any poll: the cell must end at f3.
        server.publish(&f1).await.unwrap();
        server.publish(&f2).await.unwrap();
        server.publish(&f3).await.unwrap();

        wait_for_latest(&client, &f3).await;
        assert!(client.is_connected());
        server.shutdown().await;
    }

    #[tokio::test]
    async fn quiet_stream_is_not_an_error() {
        let server = bind_server().await;
        let client = StreamingClient::connect(server.local_addr(), fast_config())
            .await
            .unwrap();
        wait_for_clients(&server, 1).await;

        // Several read timeouts elapse with nothing published.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(client.is_connected());
        assert!(client.latest().is_none());

        let frame = test_frame(0.4);
        server.publish(&frame).await.unwrap();
        wait_for_latest(&client, &frame).await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn server_close_reports_connection_closed_then_reconnect_works() {
        // Phase 1: a bare listener that sends one frame and hangs up.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let f1 = test_frame(0.1);
        let sent = encode_frame(&f1).unwrap();
        let feeder = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(&sent).await.unwrap();
            // Drop closes the socket.
        });

        let mut client = StreamingClient::connect(addr, fast_config()).await.unwrap();
        wait_for_latest(&client, &f1).await;
        feeder.await.unwrap();
        assert_eq!(
            client.wait_disconnected().await,
            DisconnectReason::ConnectionClosed
        );

        // Phase 2: reconnect to a real server; only new frames arrive.
        let server = bind_server().await;
        let client2 = StreamingClient::connect(server.local_addr(), fast_config())
            .await
            .unwrap();
        wait_for_clients(&server, 1).await;
        assert!(client2.latest().is_none());

        let f2 = test_frame(0.2);
        server.publish(&f2).await.unwrap();
        wait_for_latest(&client2, &f2).await;
        server.shutdown().await;
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_malformed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let feeder = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            // Declares ~1 EiB; the reader must refuse rather than accumulate.
            sock.write_all(&u64::MAX.to_be_bytes()).await.unwrap();
            sock
        });

        let mut client = StreamingClient::connect(addr, fast_config()).await.unwrap();
        let _sock = feeder.await.unwrap();
        assert!(matches!(
            client.wait_disconnected().await,
            DisconnectReason::MalformedFrame(_)
        ));
    }

    #[tokio::test]
    async fn garbage_payload_is_malformed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let feeder = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut msg = 16u64.to_be_bytes().to_vec();
            msg.extend_from_slice(&[0xff; 16]);
            sock.write_all(&msg).await.unwrap();
            sock
        });

        let mut client = StreamingClient::connect(addr, fast_config()).await.unwrap();
        let _sock = feeder.await.unwrap();
        assert!(matches!(
            client.wait_disconnected().await,
            DisconnectReason::MalformedFrame(_)
        ));
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let server = bind_server().await;
        let mut client = StreamingClient::connect(server.local_addr(), fast_config())
            .await
            .unwrap();
        wait_for_clients(&server, 1).await;

        client.disconnect();
        client.disconnect();
        assert_eq!(client.wait_disconnected().await, DisconnectReason::Requested);
        client.disconnect();
        // Server notices the teardown via the closed socket.
        wait_for_clients(&server, 0).await;
        server.shutdown().await;
    }
}
