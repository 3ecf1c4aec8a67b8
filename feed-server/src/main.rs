mod replay;
mod session;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Replays emergency records to relays as a document-store change feed
#[derive(Debug, Parser)]
#[command(name = "feed-server")]
struct Args {
    #[arg(long, env = "FEED_LISTEN", default_value = "127.0.0.1:7070")]
    listen: String,

    /// JSON-lines file of records to replay to every connection
    #[arg(long, env = "FEED_EVENTS")]
    events: PathBuf,

    #[arg(long, env = "FEED_SERVER_ID", default_value = "feed-server")]
    server_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();
    let events = Arc::new(replay::load(&args.events).await?);
    let server_id: Arc<str> = Arc::from(args.server_id.as_str());

    let listener = TcpListener::bind(&args.listen).await?;
    info!(
        "Feed server listening on {} with {} event(s) from {}",
        args.listen,
        events.len(),
        args.events.display()
    );

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("Relay connected: {}", addr);

        let server_id = server_id.clone();
        let events = events.clone();
        tokio::spawn(async move {
            match session::serve(socket, addr, server_id, events).await {
                Ok(()) => info!("Relay disconnected: {}", addr),
                Err(e) => error!("Session with {} ended: {:#}", addr, e),
            }
        });
    }
}
