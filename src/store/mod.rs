//! Document store access
//!
//! The relay only performs point reads: one for the triggering user and one
//! per notified contact. Backends:
//! - Firestore over its REST API
//! - An in-memory map loaded from fixtures (development and tests)

pub mod firestore;
pub mod memory;
pub mod traits;

pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::MemoryStore;
pub use traits::DocumentStore;
