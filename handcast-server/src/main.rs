// Handcast producer daemon: broadcasts synthetic hand-pose frames.

use std::time::{Duration, Instant};

use handcast_server::source::{FrameSource, SyntheticSource};
use handcast_server::{config, BroadcastServer};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = config::load();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("handcast-server {VERSION}");
                return Ok(());
            }
            "--port" => cfg.port = args.next().ok_or("--port needs a value")?.parse()?,
            "--bind" => cfg.bind = args.next().ok_or("--bind needs a value")?,
            "--fps" => cfg.frame_rate = args.next().ok_or("--fps needs a value")?.parse()?,
            "--with-image" => cfg.with_image = true,
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
        let addr: std::net::SocketAddr = format!("{}:{}", cfg.bind, cfg.port).parse()?;
        let server = BroadcastServer::bind(addr, cfg.server_options()).await?;
        let mut source = SyntheticSource::new(cfg.with_image);

        let mut ticker =
            tokio::time::interval(Duration::from_secs_f64(1.0 / cfg.frame_rate.max(1) as f64));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut published = 0u32;
        let mut last_stats = Instant::now();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let frame = source.next_frame();
                    server.publish(&frame).await?;
                    published += 1;
                    if last_stats.elapsed() >= Duration::from_secs(1) {
                        let clients = server.client_count().await;
                        info!(fps = published, clients, "streaming");
                        published = 0;
                        last_stats = Instant::now();
                    }
                }
            }
        }
        server.shutdown().await;
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
