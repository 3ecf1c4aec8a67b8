mod config;
mod dispatch;
mod push;
mod store;
mod trigger;

#[cfg(test)]
mod testing;

use clap::Parser;
use config::RelayConfig;
use dispatch::{DispatchOutcome, EmergencyDispatcher};
use futures::stream::{FuturesUnordered, StreamExt};
use push::{DryRunSender, FcmClient, PushSender};
use safewalk_shared::collections;
use std::sync::Arc;
use tokio::task::JoinError;
use store::{DocumentStore, FirestoreStore, MemoryStore};
use trigger::{FeedEvent, FeedSubscriber, TriggerRegistry};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = RelayConfig::parse();
    config.validate()?;

    info!("SafeWalk relay starting: {}", config.relay_id);
    info!("  Change feed: {}", config.feed_addr);

    // Clients are built once and shared by every invocation
    let store: Arc<dyn DocumentStore> = match &config.memory_fixtures {
        Some(path) => {
            let store = MemoryStore::load(path).await?;
            info!(
                "  Store: memory ({} documents from {})",
                store.document_count().await,
                path.display()
            );
            Arc::new(store)
        }
        None => {
            let store = FirestoreStore::new(config.firestore_config()?)?;
            info!("  Store: {}", store.name());
            Arc::new(store)
        }
    };

    let push: Arc<dyn PushSender> = if config.dry_run {
        Arc::new(DryRunSender)
    } else {
        Arc::new(FcmClient::new(config.fcm_config()?)?)
    };
    info!("  Push sender: {}", push.name());

    let mut registry = TriggerRegistry::new(config.max_instances);
    registry.on_create(
        collections::EMERGENCY_EVENTS,
        Arc::new(EmergencyDispatcher::new(store, push)),
    );
    info!("  Max instances: {}", registry.max_instances());

    let mut subscriber = FeedSubscriber::start(config.feed_config());
    let mut in_flight = FuturesUnordered::new();
    let mut tally = InvocationTally::default();

    loop {
        tokio::select! {
            event = subscriber.recv() => match event {
                Some(FeedEvent::Connected { addr }) => {
                    info!("Subscribed to change feed at {}", addr);
                }
                Some(FeedEvent::Disconnected { reason }) => {
                    warn!("Change feed disconnected: {}", reason);
                }
                Some(FeedEvent::ConnectFailed { reason, retry_in }) => {
                    error!("Change feed connection failed: {} (retrying in {:?})", reason, retry_in);
                }
                Some(FeedEvent::Created(created)) => {
                    info!(
                        "Document created: {}/{}",
                        created.collection, created.document_id
                    );
                    if let Some(invocation) = registry.dispatch(created) {
                        in_flight.push(invocation);
                    }
                }
                None => {
                    error!("Change feed subscriber stopped");
                    break;
                }
            },

            Some(joined) = in_flight.next(), if !in_flight.is_empty() => {
                tally.record(joined);
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    if !in_flight.is_empty() {
        info!("Waiting for {} in-flight invocation(s)", in_flight.len());
    }
    while let Some(joined) = in_flight.next().await {
        tally.record(joined);
    }
    info!(
        "Relay stopped after {} invocation(s), {} delivered",
        tally.finished, tally.delivered
    );

    Ok(())
}

#[derive(Default)]
struct InvocationTally {
    finished: usize,
    delivered: usize,
}

impl InvocationTally {
    fn record(&mut self, joined: Result<DispatchOutcome, JoinError>) {
        self.finished += 1;
        match joined {
            Ok(outcome) if outcome.is_delivered() => self.delivered += 1,
            Ok(_) => {}
            Err(e) => error!("Invocation aborted: {}", e),
        }
    }
}
