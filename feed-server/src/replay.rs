//! Emergency records to replay, loaded from a JSON-lines file
//!
//! Each non-blank line is `{"id": "...", "collection": "...", "fields": {...}}`.
//! `id` and `collection` are optional; `fields` may be omitted to simulate a
//! creation without a snapshot. Lines starting with `#` are comments.

use anyhow::{Context, Result};
use safewalk_shared::model::Fields;
use safewalk_shared::{collections, envelope, DocumentCreated, Envelope, Header, MessageType};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct FeedRecord {
    id: Option<String>,
    collection: Option<String>,
    fields: Option<Fields>,
}

/// One "document created" event ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEvent {
    pub collection: String,
    pub document_id: String,
    pub fields: Option<Fields>,
}

impl ReplayEvent {
    pub fn to_envelope(&self, source_id: &str, sequence_id: u64) -> Result<Envelope> {
        let envelope = match &self.fields {
            Some(fields) => Envelope::document_created(
                source_id,
                sequence_id,
                self.collection.as_str(),
                self.document_id.as_str(),
                fields,
            )?,
            None => Envelope {
                header: Some(Header::new(source_id, MessageType::MsgDocumentCreated, sequence_id)),
                payload: Some(envelope::Payload::DocumentCreated(DocumentCreated {
                    collection: self.collection.clone(),
                    document_id: self.document_id.clone(),
                    fields_json: Vec::new(),
                })),
            },
        };
        Ok(envelope)
    }
}

pub fn parse_events(input: &str) -> Result<Vec<ReplayEvent>> {
    let mut events = Vec::new();

    for (line_no, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let record: FeedRecord =
            serde_json::from_str(line).with_context(|| format!("line {}", line_no + 1))?;
        let document_id = record
            .id
            .unwrap_or_else(|| format!("evt-{}", events.len() + 1));

        events.push(ReplayEvent {
            collection: record
                .collection
                .unwrap_or_else(|| collections::EMERGENCY_EVENTS.to_owned()),
            document_id,
            fields: record.fields,
        });
    }

    Ok(events)
}

pub async fn load(path: &Path) -> Result<Vec<ReplayEvent>> {
    let input = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_events(&input).with_context(|| format!("parsing {}", path.display()))
}
