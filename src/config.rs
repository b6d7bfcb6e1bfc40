use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::retry::RetryConfig;

/// How unified messages reach their recipients.
#[derive(Clone, Copy, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageDelivery {
    /// Forward one payload to the messaging relay, which fans out itself.
    #[default]
    Relay,
    /// Resolve tokens here and push to each one.
    Push,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub gcp_project_id: String,

    #[serde(default = "default_firestore_base_url")]
    pub firestore_base_url: String,
    #[serde(default = "default_fcm_base_url")]
    pub fcm_base_url: String,
    #[serde(default = "default_identity_toolkit_base_url")]
    pub identity_toolkit_base_url: String,

    pub messaging_relay_url: String,
    pub email_relay_url: String,

    #[serde(default)]
    pub message_delivery: MessageDelivery,
    #[serde(default = "default_profile_fallback_field")]
    pub profile_fallback_field: String,

    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_idempotency_ttl_seconds")]
    pub idempotency_ttl_seconds: u64,

    pub admin_api_key: String,
    pub delete_user_api_key: String,

    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: u64,

    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

fn default_firestore_base_url() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_fcm_base_url() -> String {
    "https://fcm.googleapis.com".to_string()
}

fn default_identity_toolkit_base_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_profile_fallback_field() -> String {
    "dni".to_string()
}

fn default_idempotency_ttl_seconds() -> u64 {
    86_400
}

fn default_max_retry_attempts() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    200
}

fn default_max_retry_delay_ms() -> u64 {
    2_000
}

fn default_retry_backoff_multiplier() -> u64 {
    2
}

fn default_server_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|e| anyhow!("Invalid or missing environmental variable: {}", e))?;
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }
}
