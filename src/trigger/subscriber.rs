//! Change-feed subscriber with persistent connection and automatic reconnection

use anyhow::{anyhow, Result};
use bytes::Bytes;
use safewalk_shared::{
    codec::{self, FrameDecoder},
    envelope::Payload,
    feed, DocumentCreated, Envelope,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, timeout, Instant};
use tracing::{debug, warn};

/// Events emitted by the subscriber
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Connected { addr: String },
    Disconnected { reason: String },
    /// A document was created upstream
    Created(DocumentCreated),
    /// A connection attempt failed; another follows after the backoff delay
    ConnectFailed { reason: String, retry_in: Duration },
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Identifier sent in outbound headers
    pub relay_id: String,
    /// Change-feed endpoint (`host:port`)
    pub feed_addr: String,
    /// Reconnection delay (initial)
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
    pub connect_timeout: Duration,
    /// Drop the connection when nothing arrives for this long
    pub read_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            relay_id: "relay-001".into(),
            feed_addr: "127.0.0.1:7070".into(),
            reconnect_delay: Duration::from_millis(feed::RECONNECT_DELAY_MS),
            max_reconnect_delay: Duration::from_millis(feed::MAX_RECONNECT_DELAY_MS),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(feed::READ_TIMEOUT_MS),
        }
    }
}

/// Keeps a change-feed connection open and surfaces its events
pub struct FeedSubscriber {
    event_rx: mpsc::Receiver<FeedEvent>,
}

impl FeedSubscriber {
    /// Spawn the connection loop
    pub fn start(config: FeedConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<FeedEvent>(100);

        tokio::spawn(async move {
            subscription_loop(config, event_tx).await;
        });

        Self { event_rx }
    }

    /// Receive the next feed event; `None` once the loop has stopped
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.event_rx.recv().await
    }
}

/// Connect, serve, and reconnect with exponential backoff until the
/// receiving side goes away
async fn subscription_loop(config: FeedConfig, event_tx: mpsc::Sender<FeedEvent>) {
    let sequence_id = AtomicU64::new(0);
    let mut reconnect_delay = config.reconnect_delay;

    loop {
        let failure = match timeout(config.connect_timeout, TcpStream::connect(&config.feed_addr)).await {
            Ok(Ok(stream)) => {
                reconnect_delay = config.reconnect_delay;

                let connected = FeedEvent::Connected {
                    addr: config.feed_addr.clone(),
                };
                if event_tx.send(connected).await.is_err() {
                    return;
                }

                let reason = match handle_connection(stream, &config, &sequence_id, &event_tx).await {
                    Ok(()) => return,
                    Err(reason) => reason.to_string(),
                };
                if event_tx.send(FeedEvent::Disconnected { reason }).await.is_err() {
                    return;
                }
                None
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timed out after {:?}", config.connect_timeout)),
        };

        if let Some(reason) = failure {
            let event = FeedEvent::ConnectFailed {
                reason,
                retry_in: reconnect_delay,
            };
            if event_tx.send(event).await.is_err() {
                return;
            }
        }

        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = next_delay(reconnect_delay, config.max_reconnect_delay);
    }
}

fn next_delay(current: Duration, max: Duration) -> Duration {
    std::cmp::min(current * 2, max)
}

/// Serve an open connection
///
/// Returns `Ok(())` only when the event receiver has been dropped; every
/// connection problem is an `Err` carrying the disconnect reason.
async fn handle_connection(
    stream: TcpStream,
    config: &FeedConfig,
    sequence_id: &AtomicU64,
    event_tx: &mpsc::Sender<FeedEvent>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    let mut heartbeat_interval = interval(Duration::from_millis(feed::HEARTBEAT_INTERVAL_MS));
    let start_time = Instant::now();

    // Pushed forward on every read; the heartbeat tick must not restart it
    let idle_deadline = sleep(config.read_timeout);
    tokio::pin!(idle_deadline);

    loop {
        tokio::select! {
            _ = heartbeat_interval.tick() => {
                let seq = sequence_id.fetch_add(1, Ordering::SeqCst) + 1;
                let uptime_ms = start_time.elapsed().as_millis() as u64;
                let frame: Bytes = codec::encode(&Envelope::heartbeat(&config.relay_id, seq, uptime_ms))?;
                writer.write_all(&frame).await?;
            }

            _ = &mut idle_deadline => {
                return Err(anyhow!("No data from feed for {:?}", config.read_timeout));
            }

            result = reader.read(&mut read_buf) => {
                let n = match result {
                    Ok(0) => return Err(anyhow!("Feed closed connection")),
                    Ok(n) => n,
                    Err(e) => return Err(anyhow!("Read error: {}", e)),
                };
                idle_deadline.as_mut().reset(Instant::now() + config.read_timeout);
                decoder.extend(&read_buf[..n]);

                while let Some(envelope) = decoder.decode_next()? {
                    if let Some(event) = feed_event(envelope) {
                        if event_tx.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Map an inbound envelope to the event it produces, if any
fn feed_event(envelope: Envelope) -> Option<FeedEvent> {
    let source = envelope
        .header
        .as_ref()
        .map(|h| h.source_id.as_str())
        .unwrap_or("?")
        .to_owned();

    match envelope.payload {
        Some(Payload::DocumentCreated(created)) => Some(FeedEvent::Created(created)),
        Some(Payload::Heartbeat(hb)) => {
            debug!("Feed heartbeat from {}: uptime={}ms", source, hb.uptime_ms);
            None
        }
        None => {
            warn!("Envelope from {} without payload", source);
            None
        }
    }
}
