//! Emergency notification dispatch
//!
//! This module handles:
//! - Guarding on record status and triggering user
//! - Resolving notified contacts to push tokens
//! - Composing the SOS multicast payload
//! - Handing the payload to the push sender and reporting the outcome

pub mod compose;
mod handler;
pub mod outcome;

pub use handler::EmergencyDispatcher;
pub use outcome::DispatchOutcome;
