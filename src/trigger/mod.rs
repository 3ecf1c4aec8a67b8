//! Document-created triggers
//!
//! This module handles:
//! - Subscribing to the store's change feed over a persistent connection
//! - Routing created documents to the handler registered for their collection
//! - Bounding the number of concurrently running invocations

mod registry;
mod subscriber;

pub use registry::{DocumentHandler, TriggerRegistry};
pub use subscriber::{FeedConfig, FeedEvent, FeedSubscriber};
