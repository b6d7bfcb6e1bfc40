use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{config::Config, models::retry::RetryConfig, utils::retry_with_backoff};

/// Payload the messaging relay fans out to participants.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    pub message_id: String,
    pub sender_id: Option<String>,
    pub participants_ids: Vec<String>,
    pub message_type: String,
    pub message_content: String,
    pub message_title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Query parameters of the email relay's linking-request template.
#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub destinatario: String,
    pub asunto: String,
    pub nombre: String,
    #[serde(rename = "tipoPlantilla")]
    pub tipo_plantilla: String,
    #[serde(rename = "nombreAlumno")]
    pub nombre_alumno: String,
    pub estado: String,
    pub observaciones: String,
}

/// Client for the script webhooks that relay messages and send email.
pub struct AppsScriptClient {
    http_client: Client,
    messaging_url: String,
    email_url: String,
    retry_config: RetryConfig,
}

impl AppsScriptClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Self::with_urls(
            &config.messaging_relay_url,
            &config.email_relay_url,
            config.retry_config(),
        )
    }

    pub fn with_urls(
        messaging_url: &str,
        email_url: &str,
        retry_config: RetryConfig,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!("Script relay client initialized");

        Ok(Self {
            http_client,
            messaging_url: messaging_url.to_string(),
            email_url: email_url.to_string(),
            retry_config,
        })
    }

    pub async fn relay_message(&self, message: &RelayMessage) -> Result<Value, Error> {
        debug!(
            message_id = %message.message_id,
            participants = message.participants_ids.len(),
            "Forwarding message to messaging relay"
        );

        retry_with_backoff(&self.retry_config, || {
            let request = self.http_client.post(&self.messaging_url).json(message);

            async move {
                let response = request.send().await.map_err(|e| e.to_string())?;
                let status = response.status();

                if !status.is_success() {
                    return Err(format!("Messaging relay returned status {}", status));
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|e| format!("Failed to parse relay response: {}", e))
            }
        })
        .await
        .map_err(|e| anyhow!("Messaging relay failed: {}", e))
    }

    /// Sends one templated email. A reply whose `status` is not `OK` is a
    /// failure even when the HTTP status is 2xx.
    pub async fn send_email(&self, email: &EmailRequest) -> Result<Value, Error> {
        debug!(
            recipient = %email.destinatario,
            estado = %email.estado,
            "Sending email through relay"
        );

        let reply = retry_with_backoff(&self.retry_config, || {
            let request = self.http_client.get(&self.email_url).query(email);

            async move {
                let response = request.send().await.map_err(|e| e.to_string())?;
                let status = response.status();

                if !status.is_success() {
                    return Err(format!("Email relay returned status {}", status));
                }

                response
                    .json::<Value>()
                    .await
                    .map_err(|e| format!("Failed to parse email relay response: {}", e))
            }
        })
        .await
        .map_err(|e| anyhow!("Email relay failed: {}", e))?;

        if reply.get("status").and_then(Value::as_str) == Some("OK") {
            Ok(reply)
        } else {
            let message = reply
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(anyhow!("Email relay rejected the request: {}", message))
        }
    }
}
