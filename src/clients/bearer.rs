use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;
use gcp_auth::TokenProvider;

pub const CLOUD_PLATFORM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];
pub const FCM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/firebase.messaging"];

/// Source of OAuth bearer tokens for Google APIs.
#[async_trait]
pub trait BearerSource: Send + Sync {
    async fn bearer(&self) -> Result<String, Error>;
}

/// Application-default credentials. The provider caches and refreshes
/// tokens, so one instance is shared per scope set.
pub struct GcpBearer {
    provider: Arc<dyn TokenProvider>,
    scopes: &'static [&'static str],
}

impl GcpBearer {
    pub fn new(provider: Arc<dyn TokenProvider>, scopes: &'static [&'static str]) -> Self {
        Self { provider, scopes }
    }
}

#[async_trait]
impl BearerSource for GcpBearer {
    async fn bearer(&self) -> Result<String, Error> {
        let token = self.provider.token(self.scopes).await?;
        Ok(token.as_str().to_string())
    }
}

/// Fixed token, for emulators and tests.
pub struct StaticBearer(pub String);

#[async_trait]
impl BearerSource for StaticBearer {
    async fn bearer(&self) -> Result<String, Error> {
        Ok(self.0.clone())
    }
}
