use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use reqwest::Client;
use tracing::{debug, info};

use crate::{
    clients::bearer::BearerSource,
    config::Config,
    models::fcm::{FcmMessage, FcmRequest, FcmResponse},
    utils::token_preview,
};

pub struct FcmClient {
    http_client: Client,
    send_url: String,
    bearer: Arc<dyn BearerSource>,
}

impl FcmClient {
    pub fn new(config: &Config, bearer: Arc<dyn BearerSource>) -> Result<Self, Error> {
        Self::with_endpoint(&config.fcm_base_url, &config.gcp_project_id, bearer)
    }

    pub fn with_endpoint(
        base_url: &str,
        project_id: &str,
        bearer: Arc<dyn BearerSource>,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            base_url.trim_end_matches('/'),
            project_id
        );

        info!(project_id, "FCM client initialized");

        Ok(Self {
            http_client,
            send_url,
            bearer,
        })
    }

    /// Sends one message and returns the provider's message name.
    pub async fn send(&self, message: &FcmMessage) -> Result<Option<String>, Error> {
        debug!(
            token = %token_preview(&message.token),
            "Sending FCM push notification"
        );

        let token = self.bearer.bearer().await?;
        let request = FcmRequest {
            message: message.clone(),
        };

        let response = self
            .http_client
            .post(&self.send_url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let body: FcmResponse = response
                .json()
                .await
                .unwrap_or(FcmResponse { name: None });
            Ok(body.name)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(anyhow!("FCM request failed with status {}: {}", status, error_text))
        }
    }
}
