//! SafeWalk Shared Types
//!
//! Change-feed protocol and codec shared by the relay and the feed server,
//! plus the emergency record and push notification models.

pub mod codec;
pub mod message;
pub mod model;
pub mod proto;

use std::time::{SystemTime, UNIX_EPOCH};

pub use proto::*;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Document-store collections the relay reads
pub mod collections {
    /// Emergency records; creations here trigger notifications
    pub const EMERGENCY_EVENTS: &str = "emergency_events";

    /// User profiles holding display names and push tokens
    pub const USERS: &str = "users";
}

/// Timing parameters for change-feed connections
pub mod feed {
    /// Heartbeat interval in milliseconds
    pub const HEARTBEAT_INTERVAL_MS: u64 = 1000;

    /// Idle read limit before a connection is considered dead
    pub const READ_TIMEOUT_MS: u64 = 15000;

    pub const RECONNECT_DELAY_MS: u64 = 1000;

    pub const MAX_RECONNECT_DELAY_MS: u64 = 30000;
}

impl Header {
    pub fn new(source_id: impl Into<String>, msg_type: MessageType, sequence_id: u64) -> Self {
        Self {
            source_id: source_id.into(),
            sequence_id,
            timestamp_ms: now_ms(),
            msg_type: msg_type.into(),
        }
    }
}

impl Envelope {
    /// Envelope announcing a newly created document
    pub fn document_created(
        source_id: &str,
        sequence_id: u64,
        collection: impl Into<String>,
        document_id: impl Into<String>,
        fields: &model::Fields,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            header: Some(Header::new(source_id, MessageType::MsgDocumentCreated, sequence_id)),
            payload: Some(envelope::Payload::DocumentCreated(DocumentCreated {
                collection: collection.into(),
                document_id: document_id.into(),
                fields_json: serde_json::to_vec(fields)?,
            })),
        })
    }

    pub fn heartbeat(source_id: &str, sequence_id: u64, uptime_ms: u64) -> Self {
        Self {
            header: Some(Header::new(source_id, MessageType::MsgHeartbeat, sequence_id)),
            payload: Some(envelope::Payload::Heartbeat(Heartbeat { uptime_ms })),
        }
    }
}

impl DocumentCreated {
    /// Decode the carried field set; `None` when the creation had no snapshot
    pub fn fields(&self) -> Result<Option<model::Fields>, serde_json::Error> {
        if self.fields_json.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&self.fields_json).map(Some)
    }
}
