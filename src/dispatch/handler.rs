//! Emergency dispatch handler - resolves contacts and sends the SOS alert

use super::compose;
use super::outcome::{DispatchOutcome, SkipReason};
use crate::push::PushSender;
use crate::store::DocumentStore;
use crate::trigger::DocumentHandler;
use async_trait::async_trait;
use futures::future::join_all;
use safewalk_shared::collections;
use safewalk_shared::model::{EmergencyEvent, Fields, UserProfile};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Push tokens resolved from a contact list
#[derive(Debug, Default, PartialEq)]
pub struct TokenResolution {
    /// Tokens in contact order, duplicates kept
    pub tokens: Vec<String>,
    pub lookup_failures: usize,
}

/// Handles creation of emergency records
pub struct EmergencyDispatcher {
    store: Arc<dyn DocumentStore>,
    push: Arc<dyn PushSender>,
}

impl EmergencyDispatcher {
    pub fn new(store: Arc<dyn DocumentStore>, push: Arc<dyn PushSender>) -> Self {
        Self { store, push }
    }

    /// Run the lookup → resolve → compose → send pipeline for one record
    pub async fn handle_created(&self, event_id: &str, fields: Option<&Fields>) -> DispatchOutcome {
        let Some(fields) = fields else {
            return DispatchOutcome::Skipped(SkipReason::MissingRecord);
        };

        let event = EmergencyEvent::from_fields(fields);
        if !event.is_active() {
            return DispatchOutcome::Skipped(SkipReason::Inactive {
                status: event.status,
            });
        }

        let Some(user_id) = event.user_id.as_deref().filter(|id| !id.is_empty()) else {
            return DispatchOutcome::Skipped(SkipReason::MissingUserId);
        };

        let user = match self.store.get(collections::USERS, user_id).await {
            Ok(Some(fields)) => UserProfile::from_fields(&fields),
            Ok(None) => {
                return DispatchOutcome::Skipped(SkipReason::UnknownUser {
                    user_id: user_id.to_owned(),
                });
            }
            Err(e) => {
                error!("Failed to read user {}: {:#}", user_id, e);
                return DispatchOutcome::Failed {
                    reason: format!("reading user {}: {}", user_id, e),
                };
            }
        };
        let user_name = user.display_name();

        let resolution = self.resolve_tokens(&event.notified_contact_ids).await;
        if resolution.tokens.is_empty() {
            info!("No FCM tokens found for emergency contacts");
            return DispatchOutcome::NoRecipients {
                contacts: event.notified_contact_ids.len(),
                lookup_failures: resolution.lookup_failures,
            };
        }

        let message = compose::emergency_alert(
            event_id,
            user_id,
            user_name,
            &event.lat,
            &event.lng,
            resolution.tokens,
        );

        match self.push.send_each_for_multicast(&message).await {
            Ok(batch) => {
                info!("Successfully sent {} notifications", batch.success_count);
                info!("Failed to send {} notifications", batch.failure_count);
                DispatchOutcome::Delivered {
                    success_count: batch.success_count,
                    failure_count: batch.failure_count,
                    lookup_failures: resolution.lookup_failures,
                }
            }
            Err(e) => {
                error!("Error sending notifications via {}: {:#}", self.push.name(), e);
                DispatchOutcome::SendFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Look up every contact concurrently and collect their push tokens
    ///
    /// A failed lookup is logged and counted; it does not discard the tokens
    /// resolved by the other lookups.
    pub async fn resolve_tokens(&self, contact_ids: &[String]) -> TokenResolution {
        // An empty id names no document
        let contact_ids: Vec<&String> = contact_ids.iter().filter(|id| !id.is_empty()).collect();
        let lookups = contact_ids
            .iter()
            .map(|id| self.store.get(collections::USERS, id.as_str()));
        let results = join_all(lookups).await;

        let mut resolution = TokenResolution::default();
        for (contact_id, result) in contact_ids.iter().zip(results) {
            match result {
                Ok(Some(fields)) => match UserProfile::from_fields(&fields).delivery_token() {
                    Some(token) => resolution.tokens.push(token.to_owned()),
                    None => debug!("Contact {} has no push token", contact_id),
                },
                Ok(None) => debug!("Contact {} not found", contact_id),
                Err(e) => {
                    warn!("Failed to read contact {}: {:#}", contact_id, e);
                    resolution.lookup_failures += 1;
                }
            }
        }

        resolution
    }
}

#[async_trait]
impl DocumentHandler for EmergencyDispatcher {
    async fn on_create(&self, document_id: &str, fields: Option<Fields>) -> DispatchOutcome {
        self.handle_created(document_id, fields.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::testing::{FailingSender, RecordingSender};
    use crate::store::testing::FailingStore;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn users() -> MemoryStore {
        MemoryStore::from_json(json!({
            "users": {
                "u1": {"name": "Ana", "fcmToken": "tokU1"},
                "nameless": {"fcmToken": "tokN"},
                "A": {"name": "Contact A", "fcmToken": "tokA"},
                "B": {"name": "Contact B"},
                "C": {"name": "Contact C", "fcmToken": "tokC"},
                "E": {"name": "Contact E", "fcmToken": ""}
            }
        }))
        .expect("valid fixtures")
    }

    fn active(user_id: &str, contacts: &[&str]) -> Fields {
        fields(json!({
            "userId": user_id,
            "status": "active",
            "lat": 19.4326,
            "lng": -99.1332,
            "notifiedContactIds": contacts
        }))
    }

    struct Harness<S> {
        store: Arc<S>,
        push: Arc<RecordingSender>,
        dispatcher: EmergencyDispatcher,
    }

    fn harness<S: DocumentStore + 'static>(store: S) -> Harness<S> {
        let store = Arc::new(store);
        let push = Arc::new(RecordingSender::default());
        let dispatcher = EmergencyDispatcher::new(store.clone(), push.clone());
        Harness {
            store,
            push,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_inactive_record_reads_and_sends_nothing() {
        let h = harness(users());
        let mut record = active("u1", &["A"]);
        record.insert("status".into(), json!("resolved"));

        let outcome = h.dispatcher.handle_created("evt-1", Some(&record)).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Skipped(SkipReason::Inactive {
                status: Some("resolved".into())
            })
        );
        assert_eq!(h.store.reads(), 0);
        assert!(h.push.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_record_is_a_no_op() {
        let h = harness(users());

        let outcome = h.dispatcher.handle_created("evt-1", None).await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::MissingRecord));
        assert_eq!(h.store.reads(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_reads_once() {
        let h = harness(users());

        let outcome = h
            .dispatcher
            .handle_created("evt-1", Some(&active("ghost", &["A"])))
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Skipped(SkipReason::UnknownUser {
                user_id: "ghost".into()
            })
        );
        assert_eq!(h.store.reads(), 1);
        assert!(h.push.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_user_id_skips_without_reading() {
        let h = harness(users());
        let mut record = active("u1", &["A"]);
        record.remove("userId");

        let outcome = h.dispatcher.handle_created("evt-1", Some(&record)).await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::MissingUserId));
        assert_eq!(h.store.reads(), 0);
    }

    #[tokio::test]
    async fn test_empty_user_id_skips_without_reading() {
        let h = harness(users());

        let outcome = h
            .dispatcher
            .handle_created("evt-1", Some(&active("", &["A"])))
            .await;

        assert_eq!(outcome, DispatchOutcome::Skipped(SkipReason::MissingUserId));
        assert_eq!(h.store.reads(), 0);
        assert!(h.push.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_contact_ids_are_not_looked_up() {
        let h = harness(users());

        let outcome = h
            .dispatcher
            .handle_created("evt-1", Some(&active("u1", &["", "A", ""])))
            .await;

        assert!(matches!(outcome, DispatchOutcome::Delivered { success_count: 1, .. }));
        // The trigger user plus contact A
        assert_eq!(h.store.reads(), 2);
        let sent = h.push.sent().await;
        assert_eq!(sent[0].tokens, vec!["tokA"]);
    }

    #[tokio::test]
    async fn test_no_contacts_sends_nothing() {
        let h = harness(users());

        let outcome = h
            .dispatcher
            .handle_created("evt-1", Some(&active("u1", &[])))
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::NoRecipients {
                contacts: 0,
                lookup_failures: 0
            }
        );
        assert_eq!(h.store.reads(), 1);
        assert!(h.push.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_contacts_without_tokens_are_excluded() {
        let h = harness(users());

        let outcome = h
            .dispatcher
            .handle_created("evt-1", Some(&active("u1", &["A", "B"])))
            .await;

        assert!(outcome.is_delivered());
        let sent = h.push.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].tokens, vec!["tokA"]);
        assert_eq!(h.store.reads(), 3);
    }

    #[tokio::test]
    async fn test_token_order_follows_contacts_with_duplicates() {
        let h = harness(users());

        h.dispatcher
            .handle_created("evt-1", Some(&active("u1", &["C", "missing", "E", "A", "C"])))
            .await;

        let sent = h.push.sent().await;
        assert_eq!(sent[0].tokens, vec!["tokC", "tokA", "tokC"]);
    }

    #[tokio::test]
    async fn test_only_unreachable_contacts_means_no_recipients() {
        let h = harness(users());

        let outcome = h
            .dispatcher
            .handle_created("evt-1", Some(&active("u1", &["B", "E", "nobody"])))
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::NoRecipients {
                contacts: 3,
                lookup_failures: 0
            }
        );
        assert!(h.push.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_payload_for_nameless_user() {
        let h = harness(users());
        let record = fields(json!({
            "userId": "nameless",
            "status": "active",
            "lng": 19.4,
            "notifiedContactIds": ["A"]
        }));

        h.dispatcher.handle_created("evt-42", Some(&record)).await;

        let sent = h.push.sent().await;
        let message = &sent[0];
        assert_eq!(message.notification.title, compose::ALERT_TITLE);
        assert_eq!(message.data["userName"], "Un usuario");
        assert_eq!(message.data["userId"], "nameless");
        assert_eq!(message.data["lat"], "0");
        assert_eq!(message.data["lng"], "19.4");
        assert_eq!(message.data["eventId"], "evt-42");
        assert_eq!(message.data["type"], "emergency_alert");
    }

    #[tokio::test]
    async fn test_delivery_counts_reported() {
        let store = Arc::new(users());
        let push = Arc::new(RecordingSender {
            rejected: vec!["tokC".into()],
            ..Default::default()
        });
        let dispatcher = EmergencyDispatcher::new(store, push);

        let outcome = dispatcher
            .handle_created("evt-1", Some(&active("u1", &["A", "C"])))
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                success_count: 1,
                failure_count: 1,
                lookup_failures: 0
            }
        );
    }

    #[tokio::test]
    async fn test_send_failure_is_terminal_and_leaves_record_untouched() {
        let store = Arc::new(users());
        let record = active("u1", &["A"]);
        store
            .insert(collections::EMERGENCY_EVENTS, "evt-1", record.clone())
            .await;
        let push = Arc::new(FailingSender::default());
        let dispatcher = EmergencyDispatcher::new(store.clone(), push.clone());

        let outcome = dispatcher.handle_created("evt-1", Some(&record)).await;

        assert!(matches!(outcome, DispatchOutcome::SendFailed { .. }));
        assert_eq!(*push.attempts.lock().await, 1);
        assert_eq!(
            store.snapshot(collections::EMERGENCY_EVENTS, "evt-1").await,
            Some(record)
        );
    }

    #[tokio::test]
    async fn test_failed_contact_lookup_keeps_other_tokens() {
        let h = harness(FailingStore::new(users(), &["B"]));

        let outcome = h
            .dispatcher
            .handle_created("evt-1", Some(&active("u1", &["A", "B", "C"])))
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                success_count: 2,
                failure_count: 0,
                lookup_failures: 1
            }
        );
        assert_eq!(h.push.sent().await[0].tokens, vec!["tokA", "tokC"]);
    }

    #[tokio::test]
    async fn test_failed_user_lookup_is_reported_not_raised() {
        let h = harness(FailingStore::new(users(), &["u1"]));

        let outcome = h
            .dispatcher
            .handle_created("evt-1", Some(&active("u1", &["A"])))
            .await;

        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
        assert!(h.push.sent().await.is_empty());
    }
}
