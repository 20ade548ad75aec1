// Handcast terminal viewer: polls the latest frame and prints per-second stats.

use std::time::Duration;

use handcast_client::{ClientConfig, StreamingClient};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut addr = "127.0.0.1:5555".to_string();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("handcast-client {VERSION}");
                return Ok(());
            }
            "--addr" => addr = args.next().ok_or("--addr needs a value")?,
            other => return Err(format!("unknown argument: {other}").into()),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let addr: std::net::SocketAddr = addr.parse()?;
        let mut client = StreamingClient::connect(addr, ClientConfig::default()).await?;
        info!(%addr, "connected");

        let mut updates = client.updates();
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut frames = 0u32;
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    client.disconnect();
                    break;
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    frames += 1;
                }
                _ = ticker.tick() => {
                    let (hands, image) = client
                        .latest()
                        .map(|f| (f.hands().len(), f.has_image()))
                        .unwrap_or((0, false));
                    info!(fps = frames, hands, image, "receiving");
                    frames = 0;
                }
            }
        }

        let reason = client.wait_disconnected().await;
        info!(%reason, "disconnected");
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}
