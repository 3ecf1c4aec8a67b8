//! Push delivery abstraction

use anyhow::Result;
use async_trait::async_trait;
use safewalk_shared::message::{BatchResponse, MulticastMessage};

/// Delivers one notification to many device tokens
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver `message` to each of its tokens and report per-token outcomes.
    ///
    /// An `Err` means the request as a whole could not be attempted; failures
    /// of individual tokens are reported inside the [`BatchResponse`].
    async fn send_each_for_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse>;

    /// Human-readable name for this sender
    fn name(&self) -> &'static str;
}
