//! In-process document store for development fixtures and tests

use crate::store::traits::DocumentStore;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use safewalk_shared::model::Fields;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Collections of documents held in memory
///
/// Counts every [`DocumentStore::get`] so callers can assert read volume.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Fields>>>,
    reads: AtomicUsize,
}

impl MemoryStore {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `{ "<collection>": { "<id>": { ...fields } } }`
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(collections) = value else {
            return Err(anyhow!("fixtures must be a JSON object of collections"));
        };

        let mut loaded = HashMap::new();
        for (collection, documents) in collections {
            let Value::Object(documents) = documents else {
                return Err(anyhow!("collection {} must be an object of documents", collection));
            };

            let mut docs = HashMap::new();
            for (id, fields) in documents {
                match fields {
                    Value::Object(fields) => {
                        docs.insert(id, fields);
                    }
                    _ => return Err(anyhow!("document {}/{} must be an object", collection, id)),
                }
            }
            loaded.insert(collection, docs);
        }

        Ok(Self {
            collections: RwLock::new(loaded),
            reads: AtomicUsize::new(0),
        })
    }

    /// Load fixtures from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading fixtures {}", path.display()))?;
        let value: Value = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing fixtures {}", path.display()))?;
        Self::from_json(value)
    }

    #[cfg(test)]
    pub async fn insert(&self, collection: &str, id: &str, fields: Fields) {
        self.collections
            .write()
            .await
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), fields);
    }

    /// Read a document without counting it as a store read
    pub async fn snapshot(&self, collection: &str, id: &str) -> Option<Fields> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Number of `get` calls served so far
    #[cfg(test)]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub async fn document_count(&self) -> usize {
        self.collections.read().await.values().map(HashMap::len).sum()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Fields>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot(collection, id).await)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
