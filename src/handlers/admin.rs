//! Shared-secret protected administrative endpoints.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{
    api::AppState,
    error::{NotifierError, Result},
    handlers::claims::{ClaimsSyncReport, sync_all},
    models::{
        claims::CustomClaims,
        document::{Fields, collections, timestamp_value},
        event::non_empty_string,
        profile::UserProfile,
        response::ApiResponse,
        status::DeletionStatus,
    },
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeletionRequestBody {
    #[serde(deserialize_with = "non_empty_string")]
    pub email: Option<String>,
    #[serde(deserialize_with = "non_empty_string")]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateUidBody {
    #[serde(deserialize_with = "non_empty_string")]
    pub dni: Option<String>,
    #[serde(deserialize_with = "non_empty_string")]
    pub firebase_uid: Option<String>,
    #[serde(deserialize_with = "non_empty_string")]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncClaimsBody {
    #[serde(deserialize_with = "non_empty_string")]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRequested {
    pub request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub dni: Option<String>,
    pub nombre: Option<String>,
    pub apellidos: Option<String>,
    pub email: Option<String>,
    pub firebase_uid: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UidUpdated {
    pub user_data: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_claims: Option<CustomClaims>,
}

/// Plain equality against the configured secret. An unset secret never
/// matches.
fn authorize(provided: Option<&str>, expected: &str) -> Result<()> {
    match provided {
        Some(key) if !expected.is_empty() && key == expected => Ok(()),
        _ => Err(NotifierError::Unauthorized),
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Bodies are read leniently so the secret is always checked first. A body
/// that is not a JSON object reads as empty, and mistyped fields as absent.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

pub async fn request_user_deletion(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ApiResponse<DeletionRequested>>> {
    let body: DeletionRequestBody = parse_body(&body);
    authorize(body.api_key.as_deref(), &state.delete_user_api_key)?;

    let email = required(body.email).ok_or_else(|| NotifierError::MissingFields("email".to_string()))?;

    let mut fields = Fields::new();
    fields.insert("email".to_string(), json!(email));
    fields.insert("status".to_string(), json!(DeletionStatus::Pending));
    fields.insert("createdAt".to_string(), timestamp_value(Utc::now()));
    fields.insert("requestSource".to_string(), json!("HTTP_API"));

    let request_id = state
        .context
        .store
        .add(collections::DELETION_REQUESTS, fields)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create deletion request");
            NotifierError::store(e)
        })?;

    info!(request_id = %request_id, email = %email, "Deletion request created");

    Ok(Json(ApiResponse::success(
        DeletionRequested { request_id },
        "Deletion request created".to_string(),
    )))
}

pub async fn update_user_firebase_uid(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ApiResponse<UidUpdated>>> {
    let body: UpdateUidBody = parse_body(&body);
    authorize(body.api_key.as_deref(), &state.admin_api_key)?;

    let (Some(dni), Some(firebase_uid)) = (required(body.dni), required(body.firebase_uid)) else {
        return Err(NotifierError::MissingFields("dni, firebaseUid".to_string()));
    };

    let store = &state.context.store;

    let mut fields = Fields::new();
    fields.insert("firebaseUid".to_string(), Value::String(firebase_uid.clone()));

    store
        .update(collections::USERS, &dni, fields)
        .await
        .map_err(NotifierError::store)?;

    let document = store
        .get(collections::USERS, &dni)
        .await
        .map_err(NotifierError::store)?
        .ok_or_else(|| NotifierError::NotFound(format!("User {} not found", dni)))?;

    let profile = UserProfile::from_document(document);
    info!(dni = %dni, firebase_uid = %firebase_uid, "User firebaseUid updated");

    let user_data = UserSummary {
        dni: profile.dni().map(str::to_string),
        nombre: profile.nombre().map(str::to_string),
        apellidos: profile.apellidos().map(str::to_string),
        email: profile.email().map(str::to_string),
        firebase_uid: profile.firebase_uid().map(str::to_string),
    };

    let claims = CustomClaims::derive(dni.as_str(), &profile.memberships());

    match state
        .context
        .auth
        .set_custom_claims(&firebase_uid, &claims)
        .await
    {
        Ok(()) => Ok(Json(ApiResponse::success(
            UidUpdated {
                user_data,
                custom_claims: Some(claims),
            },
            format!("User {} updated", dni),
        ))),
        Err(e) => {
            error!(dni = %dni, error = %e, "Failed to set custom claims after uid update");
            Ok(Json(ApiResponse::partial(
                UidUpdated {
                    user_data,
                    custom_claims: None,
                },
                e.to_string(),
                format!("User {} updated, but custom claims could not be set", dni),
            )))
        }
    }
}

pub async fn sync_user_custom_claims(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ApiResponse<ClaimsSyncReport>>> {
    let body: SyncClaimsBody = parse_body(&body);
    authorize(body.api_key.as_deref(), &state.admin_api_key)?;

    let report = sync_all(&state.context).await?;

    Ok(Json(ApiResponse::success(
        report,
        "Custom claims sync complete".to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mistyped_or_invalid_bodies_read_as_empty() {
        let body: UpdateUidBody =
            parse_body(&Bytes::from_static(br#"{"dni":123,"firebaseUid":"uid","apiKey":"k"}"#));
        assert_eq!(body.dni, None);
        assert_eq!(body.firebase_uid.as_deref(), Some("uid"));
        assert_eq!(body.api_key.as_deref(), Some("k"));

        let body: SyncClaimsBody = parse_body(&Bytes::from_static(b"apiKey=k"));
        assert_eq!(body.api_key, None);

        let body: SyncClaimsBody = parse_body(&Bytes::from_static(b"[1, 2]"));
        assert_eq!(body.api_key, None);
    }

    #[test]
    fn test_authorize_requires_exact_match() {
        assert!(authorize(Some("secret"), "secret").is_ok());
        assert!(authorize(Some("Secret"), "secret").is_err());
        assert!(authorize(None, "secret").is_err());
        assert!(authorize(Some(""), "").is_err());
    }
}
