//! Routes "document created" events to per-collection handlers

use crate::dispatch::DispatchOutcome;
use async_trait::async_trait;
use safewalk_shared::model::Fields;
use safewalk_shared::DocumentCreated;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

/// Reacts to documents created in a collection
#[async_trait]
pub trait DocumentHandler: Send + Sync {
    /// `fields` is `None` when the creation carried no readable snapshot
    async fn on_create(&self, document_id: &str, fields: Option<Fields>) -> DispatchOutcome;
}

/// Handler table plus the instance limit shared by all invocations
pub struct TriggerRegistry {
    handlers: HashMap<String, Arc<dyn DocumentHandler>>,
    permits: Arc<Semaphore>,
    max_instances: usize,
}

impl TriggerRegistry {
    /// `max_instances` bounds how many invocations run at once (minimum 1)
    pub fn new(max_instances: usize) -> Self {
        let max_instances = max_instances.max(1);
        Self {
            handlers: HashMap::new(),
            permits: Arc::new(Semaphore::new(max_instances)),
            max_instances,
        }
    }

    /// Register `handler` for creations in `collection`, replacing any previous one
    pub fn on_create(
        &mut self,
        collection: impl Into<String>,
        handler: Arc<dyn DocumentHandler>,
    ) -> &mut Self {
        let collection = collection.into();
        if self.handlers.insert(collection.clone(), handler).is_some() {
            warn!("Replaced existing on_create handler for {}", collection);
        }
        self
    }

    pub fn max_instances(&self) -> usize {
        self.max_instances
    }

    #[cfg(test)]
    pub fn is_registered(&self, collection: &str) -> bool {
        self.handlers.contains_key(collection)
    }

    /// Start one invocation for `created`
    ///
    /// Returns `None` when no handler is registered for its collection. The
    /// invocation waits for a free instance slot before running.
    pub fn dispatch(&self, created: DocumentCreated) -> Option<JoinHandle<DispatchOutcome>> {
        let Some(handler) = self.handlers.get(&created.collection).cloned() else {
            debug!(
                "No handler for {}/{}, ignoring",
                created.collection, created.document_id
            );
            return None;
        };

        let fields = match created.fields() {
            Ok(fields) => fields,
            Err(e) => {
                warn!(
                    "Unreadable fields for {}/{}: {}",
                    created.collection, created.document_id, e
                );
                None
            }
        };

        let span = info_span!(
            "on_create",
            collection = %created.collection,
            event_id = %created.document_id
        );
        if self.permits.available_permits() == 0 {
            warn!(
                "All {} instances busy, {}/{} waits for a free slot",
                self.max_instances, created.collection, created.document_id
            );
        }
        let permits = self.permits.clone();
        let document_id = created.document_id;

        let invocation = async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return DispatchOutcome::Failed {
                    reason: "trigger registry closed".into(),
                };
            };

            let outcome = handler.on_create(&document_id, fields).await;
            info!("Invocation finished: {}", outcome);
            outcome
        };

        Some(tokio::spawn(invocation.instrument(span)))
    }
}
