//! One relay connection: replay every event, then keep the link alive

use crate::replay::ReplayEvent;
use anyhow::Result;
use safewalk_shared::{codec, codec::FrameDecoder, envelope::Payload, feed, Envelope};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::interval;
use tracing::{debug, info, warn};

pub async fn serve(
    socket: TcpStream,
    addr: SocketAddr,
    server_id: Arc<str>,
    events: Arc<Vec<ReplayEvent>>,
) -> Result<()> {
    let (mut reader, mut writer) = socket.into_split();
    let mut sequence_id = 0u64;

    for event in events.iter() {
        sequence_id += 1;
        let frame = codec::encode(&event.to_envelope(&server_id, sequence_id)?)?;
        writer.write_all(&frame).await?;
        info!(
            "[{}] seq={} CREATED {}/{}",
            addr, sequence_id, event.collection, event.document_id
        );
    }

    let mut decoder = FrameDecoder::new();
    let mut read_buf = vec![0u8; 4096];
    let mut heartbeat_interval = interval(Duration::from_millis(feed::HEARTBEAT_INTERVAL_MS));
    let started = Instant::now();

    loop {
        tokio::select! {
            _ = heartbeat_interval.tick() => {
                sequence_id += 1;
                let uptime_ms = started.elapsed().as_millis() as u64;
                let frame = codec::encode(&Envelope::heartbeat(&server_id, sequence_id, uptime_ms))?;
                writer.write_all(&frame).await?;
            }

            result = reader.read(&mut read_buf) => {
                let n = result?;
                if n == 0 {
                    return Ok(());
                }
                decoder.extend(&read_buf[..n]);

                while let Some(envelope) = decoder.decode_next()? {
                    log_inbound(addr, &envelope);
                }
            }
        }
    }
}

fn log_inbound(addr: SocketAddr, envelope: &Envelope) {
    let Some(header) = &envelope.header else {
        warn!("[{}] envelope without header", addr);
        return;
    };

    match &envelope.payload {
        Some(Payload::Heartbeat(hb)) => {
            debug!(
                "[{}] {} seq={} HEARTBEAT uptime={}ms",
                addr, header.source_id, header.sequence_id, hb.uptime_ms
            );
        }
        Some(Payload::DocumentCreated(_)) => {
            warn!(
                "[{}] {} seq={} sent a document event (relays should not publish)",
                addr, header.source_id, header.sequence_id
            );
        }
        None => {
            debug!("[{}] {} seq={} (no payload)", addr, header.source_id, header.sequence_id);
        }
    }
}
