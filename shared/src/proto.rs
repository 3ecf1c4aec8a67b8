//! Change-feed wire types
//!
//! Messages exchanged between a change-feed publisher and a relay. The
//! document field set travels as JSON bytes so the feed stays schema-free.

use prost::Message;

/// Common header carried by every envelope
#[derive(Clone, PartialEq, Message)]
pub struct Header {
    /// Identifier of the sending process (feed publisher or relay)
    #[prost(string, tag = "1")]
    pub source_id: String,

    #[prost(uint64, tag = "2")]
    pub sequence_id: u64,

    #[prost(uint64, tag = "3")]
    pub timestamp_ms: u64,

    #[prost(enumeration = "MessageType", tag = "4")]
    pub msg_type: i32,
}

/// Top-level frame payload
#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,

    #[prost(oneof = "envelope::Payload", tags = "2, 3")]
    pub payload: Option<envelope::Payload>,
}

pub mod envelope {
    /// Envelope body variants
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Payload {
        #[prost(message, tag = "2")]
        DocumentCreated(super::DocumentCreated),

        #[prost(message, tag = "3")]
        Heartbeat(super::Heartbeat),
    }
}

/// A document was created in `collection` under `document_id`
#[derive(Clone, PartialEq, Message)]
pub struct DocumentCreated {
    #[prost(string, tag = "1")]
    pub collection: String,

    #[prost(string, tag = "2")]
    pub document_id: String,

    /// JSON object with the new document's fields; empty when the store
    /// reported the creation without a snapshot
    #[prost(bytes = "vec", tag = "3")]
    pub fields_json: Vec<u8>,
}

/// Liveness signal, sent by both ends once per heartbeat interval
#[derive(Clone, PartialEq, Message)]
pub struct Heartbeat {
    #[prost(uint64, tag = "1")]
    pub uptime_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    MsgUnknown = 0,
    MsgDocumentCreated = 1,
    MsgHeartbeat = 2,
}
