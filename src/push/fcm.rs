//! Firebase Cloud Messaging HTTP v1 sender
//!
//! FCM v1 has no multicast endpoint: a multicast is fanned out as one
//! `messages:send` request per token, issued concurrently.

use crate::push::traits::PushSender;
use crate::push::PushError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Url;
use safewalk_shared::message::{
    BatchResponse, Message, MulticastMessage, SendResponse, MAX_MULTICAST_TOKENS,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Connection settings for the FCM HTTP v1 API
#[derive(Debug, Clone)]
pub struct FcmConfig {
    /// API origin, e.g. `https://fcm.googleapis.com`
    pub base_url: String,
    pub project_id: String,
    /// OAuth2 bearer token with the firebase.messaging scope
    pub access_token: String,
}

pub struct FcmClient {
    http: reqwest::Client,
    send_url: Url,
    access_token: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a Message,
}

#[derive(Deserialize)]
struct SendReply {
    name: String,
}

impl FcmClient {
    pub fn new(config: FcmConfig) -> Result<Self> {
        let send_url = Url::parse(&format!(
            "{}/v1/projects/{}/messages:send",
            config.base_url.trim_end_matches('/'),
            config.project_id
        ))
        .context("invalid FCM base URL")?;

        Ok(Self {
            http: reqwest::Client::new(),
            send_url,
            access_token: config.access_token,
        })
    }

    async fn send_one(&self, message: Message) -> SendResponse {
        let token = message.token.clone();
        let result = self
            .http
            .post(self.send_url.clone())
            .bearer_auth(&self.access_token)
            .json(&SendRequest { message: &message })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => return SendResponse::failed(token, e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<SendReply>().await {
                Ok(reply) => {
                    debug!("FCM accepted {}", reply.name);
                    SendResponse::delivered(token, reply.name)
                }
                Err(e) => SendResponse::failed(token, format!("unreadable FCM reply: {}", e)),
            };
        }

        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        SendResponse::failed(token, describe_error(status.as_u16(), &body))
    }
}

#[async_trait]
impl PushSender for FcmClient {
    async fn send_each_for_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse> {
        check_token_count(message)?;

        let sends = message
            .tokens
            .iter()
            .map(|token| self.send_one(message.for_token(token)));

        Ok(BatchResponse::from_responses(join_all(sends).await))
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}

/// Reject requests FCM would refuse before sending anything
pub fn check_token_count(message: &MulticastMessage) -> Result<(), PushError> {
    match message.tokens.len() {
        0 => Err(PushError::NoTokens),
        n if n > MAX_MULTICAST_TOKENS => Err(PushError::TooManyTokens(n)),
        _ => Ok(()),
    }
}

/// Summarise an FCM error body as `<status>: <errorCode or status name>: <message>`
fn describe_error(http_status: u16, body: &Value) -> String {
    let error = &body["error"];
    let code = error["details"]
        .as_array()
        .and_then(|details| details.iter().find_map(|d| d["errorCode"].as_str()))
        .or_else(|| error["status"].as_str())
        .unwrap_or("UNKNOWN");
    let message = error["message"].as_str().unwrap_or("no error message");

    format!("{}: {}: {}", http_status, code, message)
}
