//! Relay configuration from command-line flags and environment

use crate::push::FcmConfig;
use crate::store::FirestoreConfig;
use crate::trigger::FeedConfig;
use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

/// Default bound on concurrently running handler invocations
pub const DEFAULT_MAX_INSTANCES: usize = 10;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "safewalk-relay",
    about = "Sends SafeWalk SOS push notifications when emergency records are created"
)]
pub struct RelayConfig {
    /// Change-feed endpoint to subscribe to
    #[arg(long, env = "SAFEWALK_FEED_ADDR", default_value = "127.0.0.1:7070")]
    pub feed_addr: String,

    /// Identifier this relay reports in feed headers
    #[arg(long, env = "SAFEWALK_RELAY_ID", default_value = "relay-001")]
    pub relay_id: String,

    /// Firebase project owning the Firestore database and FCM sender
    #[arg(long, env = "SAFEWALK_PROJECT_ID")]
    pub project_id: Option<String>,

    /// OAuth2 access token for Firestore and FCM
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    #[arg(long, env = "SAFEWALK_FIRESTORE_URL", default_value = "https://firestore.googleapis.com")]
    pub firestore_url: String,

    #[arg(long, env = "SAFEWALK_FCM_URL", default_value = "https://fcm.googleapis.com")]
    pub fcm_url: String,

    /// Maximum concurrently running handler invocations
    #[arg(long, env = "SAFEWALK_MAX_INSTANCES", default_value_t = DEFAULT_MAX_INSTANCES)]
    pub max_instances: usize,

    /// Serve user lookups from a JSON fixtures file instead of Firestore
    #[arg(long, env = "SAFEWALK_MEMORY_FIXTURES")]
    pub memory_fixtures: Option<PathBuf>,

    /// Log composed notifications instead of sending them
    #[arg(long, env = "SAFEWALK_DRY_RUN")]
    pub dry_run: bool,
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_instances == 0 {
            return Err(anyhow!("max-instances must be at least 1"));
        }
        if self.memory_fixtures.is_none() {
            self.credentials("Firestore")?;
        }
        if !self.dry_run {
            self.credentials("FCM")?;
        }
        Ok(())
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            relay_id: self.relay_id.clone(),
            feed_addr: self.feed_addr.clone(),
            ..Default::default()
        }
    }

    pub fn firestore_config(&self) -> Result<FirestoreConfig> {
        let (project_id, access_token) = self.credentials("Firestore")?;
        Ok(FirestoreConfig {
            base_url: self.firestore_url.clone(),
            project_id,
            access_token,
        })
    }

    pub fn fcm_config(&self) -> Result<FcmConfig> {
        let (project_id, access_token) = self.credentials("FCM")?;
        Ok(FcmConfig {
            base_url: self.fcm_url.clone(),
            project_id,
            access_token,
        })
    }

    fn credentials(&self, backend: &str) -> Result<(String, String)> {
        let project_id = self
            .project_id
            .clone()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("{} backend requires --project-id", backend))?;
        let access_token = self
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("{} backend requires --access-token", backend))?;
        Ok((project_id, access_token))
    }
}
