//! Sender that logs messages instead of delivering them

use crate::push::fcm::check_token_count;
use crate::push::traits::PushSender;
use anyhow::Result;
use async_trait::async_trait;
use safewalk_shared::message::{BatchResponse, MulticastMessage, SendResponse};
use tracing::info;

#[derive(Debug, Default)]
pub struct DryRunSender;

#[async_trait]
impl PushSender for DryRunSender {
    async fn send_each_for_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse> {
        check_token_count(message)?;

        info!(
            "[DRY-RUN] \"{}\" / \"{}\" to {} token(s)",
            message.notification.title,
            message.notification.body,
            message.tokens.len()
        );
        for (key, value) in &message.data {
            info!("[DRY-RUN]   {} = {}", key, value);
        }

        let responses = message
            .tokens
            .iter()
            .enumerate()
            .map(|(i, token)| SendResponse::delivered(token.as_str(), format!("dry-run/{}", i)))
            .collect();

        Ok(BatchResponse::from_responses(responses))
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}
