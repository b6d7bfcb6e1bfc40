use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use crate::{
    error::{NotifierError, Result},
    handlers::{Context, Outcome},
    models::{
        document::{Fields, collections, str_at, timestamp_value},
        status::DeletionStatus,
    },
};

/// Deletes the auth account named by a deletion request and records the
/// result on the request document. Auth failures are recorded, store
/// failures propagate.
pub async fn on_created(ctx: &Context, request_id: &str, fields: &Fields) -> Result<Outcome> {
    let Some(email) = str_at(fields, &["email"]) else {
        error!(request_id, "Deletion request has no email");
        return finish(
            ctx,
            request_id,
            DeletionStatus::Error,
            None,
            Some("Email no proporcionado".to_string()),
        )
        .await;
    };

    info!(request_id, email, "Processing user deletion request");

    let user = match ctx.auth.lookup_by_email(email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(request_id, email, "No auth user for deletion request");
            return finish(
                ctx,
                request_id,
                DeletionStatus::UserNotFound,
                None,
                Some("Usuario no encontrado en Firebase Authentication".to_string()),
            )
            .await;
        }
        Err(e) => {
            error!(request_id, error = %e, "Auth user lookup failed");
            return finish(ctx, request_id, DeletionStatus::Error, None, Some(e.to_string())).await;
        }
    };

    match ctx.auth.delete_user(&user.uid).await {
        Ok(()) => {
            info!(request_id, uid = %user.uid, "User deleted from auth directory");
            finish(ctx, request_id, DeletionStatus::Completed, Some(user.uid), None).await
        }
        Err(e) => {
            error!(request_id, uid = %user.uid, error = %e, "Auth user deletion failed");
            finish(ctx, request_id, DeletionStatus::Error, None, Some(e.to_string())).await
        }
    }
}

async fn finish(
    ctx: &Context,
    request_id: &str,
    status: DeletionStatus,
    uid: Option<String>,
    error: Option<String>,
) -> Result<Outcome> {
    let mut update = Fields::new();
    update.insert("status".to_string(), json!(status));
    update.insert("processedAt".to_string(), timestamp_value(Utc::now()));
    if let Some(uid) = &uid {
        update.insert("deletedUid".to_string(), json!(uid));
    }
    if let Some(error) = &error {
        update.insert("error".to_string(), json!(error));
    }

    ctx.store
        .update(collections::DELETION_REQUESTS, request_id, update)
        .await
        .map_err(NotifierError::store)?;

    Ok(Outcome::DeletionProcessed { status, uid, error })
}
