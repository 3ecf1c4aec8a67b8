//! Push notification delivery
//!
//! Senders:
//! - FCM HTTP v1 (per-token fan-out with aggregated outcomes)
//! - Dry run (logs the composed message, reports every token delivered)

pub mod dry_run;
pub mod fcm;
pub mod traits;

pub use dry_run::DryRunSender;
pub use fcm::{FcmClient, FcmConfig};
pub use traits::PushSender;

use thiserror::Error;

/// Request-level rejections raised before any token is attempted
#[derive(Error, Debug)]
pub enum PushError {
    #[error("Multicast message has no tokens")]
    NoTokens,

    #[error("Too many tokens in multicast: {0} (max: {max})", max = safewalk_shared::message::MAX_MULTICAST_TOKENS)]
    TooManyTokens(usize),
}
