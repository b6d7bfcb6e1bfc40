use futures_util::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    error::{NotifierError, Result},
    handlers::{Context, Outcome},
    models::{
        claims::CustomClaims,
        document::{Document, Fields, collections},
        profile::UserProfile,
    },
    resolver::SkipReason,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsUpdate {
    pub dni: String,
    pub firebase_uid: String,
    pub claims: CustomClaims,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsFailure {
    pub dni: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firebase_uid: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimsSyncReport {
    pub total_processed: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub success_updates: Vec<ClaimsUpdate>,
    pub failed_updates: Vec<ClaimsFailure>,
}

/// Claims for a profile. Documents are keyed by DNI, so the id stands in
/// when the field is missing.
pub fn claims_for(profile: &UserProfile) -> CustomClaims {
    let dni = profile.dni().unwrap_or(&profile.id);
    CustomClaims::derive(dni, &profile.memberships())
}

/// Writes claims for one account. Directory failures are reported on the
/// outcome.
pub async fn apply_claims(ctx: &Context, uid: &str, claims: CustomClaims) -> Outcome {
    match ctx.auth.set_custom_claims(uid, &claims).await {
        Ok(()) => {
            info!(uid, dni = %claims.dni, "Custom claims applied");
            Outcome::ClaimsSynced {
                uid: uid.to_string(),
                claims,
                error: None,
            }
        }
        Err(e) => {
            error!(uid, dni = %claims.dni, error = %e, "Failed to apply custom claims");
            Outcome::ClaimsSynced {
                uid: uid.to_string(),
                claims,
                error: Some(e.to_string()),
            }
        }
    }
}

pub async fn on_user_created(ctx: &Context, user_id: &str, fields: &Fields) -> Result<Outcome> {
    let profile = UserProfile::from_document(Document::new(user_id, fields.clone()));

    let Some(uid) = profile.firebase_uid() else {
        info!(user_id, "New user has no firebaseUid, skipping claims");
        return Ok(Outcome::Skipped {
            reason: SkipReason::MissingFirebaseUid,
        });
    };

    Ok(apply_claims(ctx, uid, claims_for(&profile)).await)
}

/// Claims only depend on memberships and DNI; other edits are ignored.
pub async fn on_user_updated(
    ctx: &Context,
    user_id: &str,
    before: &Fields,
    after: &Fields,
) -> Result<Outcome> {
    let profile = UserProfile::from_document(Document::new(user_id, after.clone()));

    let Some(uid) = profile.firebase_uid() else {
        info!(user_id, "User has no firebaseUid, skipping claims");
        return Ok(Outcome::Skipped {
            reason: SkipReason::MissingFirebaseUid,
        });
    };

    let unchanged = before.get("perfiles") == after.get("perfiles")
        && before.get("dni") == after.get("dni");

    if unchanged {
        info!(user_id, "Memberships and DNI unchanged, skipping claims");
        return Ok(Outcome::Skipped {
            reason: SkipReason::Unchanged,
        });
    }

    Ok(apply_claims(ctx, uid, claims_for(&profile)).await)
}

/// Recomputes and writes claims for every user concurrently.
pub async fn sync_all(ctx: &Context) -> Result<ClaimsSyncReport> {
    let users = ctx
        .store
        .list(collections::USERS)
        .await
        .map_err(NotifierError::store)?;

    if users.is_empty() {
        warn!("No users found to sync claims for");
        return Err(NotifierError::NotFound("No users found".to_string()));
    }

    info!(count = users.len(), "Syncing custom claims for all users");

    let total_processed = users.len();
    let profiles: Vec<UserProfile> = users.into_iter().map(UserProfile::from_document).collect();

    let mut failed_updates = Vec::new();
    let mut pending = Vec::new();

    for profile in &profiles {
        let claims = claims_for(profile);
        match profile.firebase_uid() {
            Some(uid) => pending.push((uid, claims)),
            None => failed_updates.push(ClaimsFailure {
                dni: claims.dni,
                firebase_uid: None,
                error: "No tiene firebaseUid".to_string(),
            }),
        }
    }

    let results = join_all(pending.into_iter().map(|(uid, claims)| async move {
        let result = ctx.auth.set_custom_claims(uid, &claims).await;
        (uid, claims, result)
    }))
    .await;

    let mut success_updates = Vec::new();
    for (uid, claims, result) in results {
        match result {
            Ok(()) => success_updates.push(ClaimsUpdate {
                dni: claims.dni.clone(),
                firebase_uid: uid.to_string(),
                claims,
            }),
            Err(e) => {
                error!(uid, error = %e, "Failed to sync custom claims");
                failed_updates.push(ClaimsFailure {
                    dni: claims.dni,
                    firebase_uid: Some(uid.to_string()),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        success_count = success_updates.len(),
        failure_count = failed_updates.len(),
        "Custom claims sync finished"
    );

    Ok(ClaimsSyncReport {
        total_processed,
        success_count: success_updates.len(),
        failure_count: failed_updates.len(),
        success_updates,
        failed_updates,
    })
}
