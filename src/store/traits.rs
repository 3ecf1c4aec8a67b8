//! Document store abstraction for pluggable backends

use anyhow::Result;
use async_trait::async_trait;
use safewalk_shared::model::Fields;

/// Point lookups against a document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch `collection/id`; `Ok(None)` when the document does not exist
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Fields>>;

    /// Human-readable name for this backend
    fn name(&self) -> &'static str;
}
