use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::{clients::bearer::BearerSource, config::Config, models::claims::CustomClaims};

/// An account in the authentication user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(rename = "localId")]
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AuthUser>,
}

/// Identity Toolkit admin API for the project's user directory.
pub struct IdentityToolkitClient {
    http_client: Client,
    accounts_url: String,
    bearer: Arc<dyn BearerSource>,
}

impl IdentityToolkitClient {
    pub fn new(config: &Config, bearer: Arc<dyn BearerSource>) -> Result<Self, Error> {
        Self::with_endpoint(
            &config.identity_toolkit_base_url,
            &config.gcp_project_id,
            bearer,
        )
    }

    pub fn with_endpoint(
        base_url: &str,
        project_id: &str,
        bearer: Arc<dyn BearerSource>,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let accounts_url = format!(
            "{}/v1/projects/{}/accounts",
            base_url.trim_end_matches('/'),
            project_id
        );

        info!(project_id, "Identity Toolkit client initialized");

        Ok(Self {
            http_client,
            accounts_url,
            bearer,
        })
    }

    async fn post(&self, action: &str, body: serde_json::Value) -> Result<Response, Error> {
        let url = format!("{}:{}", self.accounts_url, action);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.bearer.bearer().await?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(anyhow!(
                "Identity Toolkit {} failed with status {}: {}",
                action,
                status,
                error_text
            ))
        }
    }

    pub async fn lookup_by_email(&self, email: &str) -> Result<Option<AuthUser>, Error> {
        debug!(email, "Looking up auth user by email");

        let response: LookupResponse = self
            .post("lookup", json!({ "email": [email] }))
            .await?
            .json()
            .await?;

        Ok(response.users.into_iter().next())
    }

    pub async fn delete_user(&self, uid: &str) -> Result<(), Error> {
        self.post("delete", json!({ "localId": uid })).await?;
        info!(uid, "Auth user deleted");
        Ok(())
    }

    pub async fn set_custom_claims(&self, uid: &str, claims: &CustomClaims) -> Result<(), Error> {
        let attributes = serde_json::to_string(claims)?;

        self.post(
            "update",
            json!({ "localId": uid, "customAttributes": attributes }),
        )
        .await?;

        debug!(uid, "Custom claims updated");
        Ok(())
    }
}
