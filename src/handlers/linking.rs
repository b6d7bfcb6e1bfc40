use tracing::{debug, info, warn};

use crate::{
    clients::apps_script::EmailRequest,
    error::{NotifierError, Result},
    handlers::{Context, EmailStatus, Outcome},
    models::{
        document::{Fields, collections},
        fcm::PushPayload,
        linking::{LinkingRequest, Resolution},
        profile::UserProfile,
    },
    resolver::{SkipReason, aggregate, dispatch_all, merge_tokens, resolve_tokens},
};

const LINKING_CHANNEL: &str = "channel_solicitudes_vinculacion";
const EMAIL_TEMPLATE: &str = "SOLICITUD_PROCESADA";

/// A new request notifies the verified admins of the requested centre.
pub async fn on_created(ctx: &Context, request_id: &str, fields: &Fields) -> Result<Outcome> {
    let request = LinkingRequest::from_fields(fields);

    let Some(centro_id) = request.centro_id.as_deref() else {
        info!(request_id, "Linking request has no centre, cannot find admins");
        return Ok(Outcome::Skipped {
            reason: SkipReason::MissingCentre,
        });
    };

    let admins: Vec<UserProfile> = ctx
        .store
        .list(collections::USERS)
        .await
        .map_err(NotifierError::store)?
        .into_iter()
        .map(UserProfile::from_document)
        .filter(|profile| profile.is_verified_admin_of(centro_id))
        .collect();

    if admins.is_empty() {
        info!(request_id, centro_id, "No verified admins for centre");
        return Ok(Outcome::Skipped {
            reason: SkipReason::NoAdmins,
        });
    }

    let mut tokens = Vec::new();
    for admin in &admins {
        merge_tokens(&mut tokens, resolve_tokens(admin));
    }

    if tokens.is_empty() {
        info!(request_id, admins = admins.len(), "Centre admins have no delivery tokens");
        return Ok(Outcome::Skipped {
            reason: SkipReason::NoTokens,
        });
    }

    let body = format!(
        "El familiar {} ha solicitado vincularse con {}",
        request.nombre_familiar.as_deref().unwrap_or("Un familiar"),
        request.alumno_nombre.as_deref().unwrap_or("un alumno")
    );

    let payload = PushPayload::new("Nueva solicitud de vinculación", body, LINKING_CHANNEL)
        .with_data("tipo", "solicitud_vinculacion")
        .with_data("solicitudId", request_id)
        .with_data("centroId", centro_id)
        .with_data("click_action", "SOLICITUD_PENDIENTE");

    let attempts = dispatch_all(&ctx.fcm, &tokens, &payload).await;
    let result = aggregate(&attempts);

    info!(
        request_id,
        success_count = result.success_count,
        failure_count = result.failure_count,
        "Linking request notifications sent to admins"
    );

    Ok(Outcome::Delivered {
        result,
        attempts,
        email: None,
    })
}

/// A resolved request notifies the family member by email and, when they
/// have a registered device, by push.
pub async fn on_updated(
    ctx: &Context,
    request_id: &str,
    before: &Fields,
    after: &Fields,
) -> Result<Outcome> {
    let previous = LinkingRequest::from_fields(before);
    let request = LinkingRequest::from_fields(after);

    let Some(resolution) =
        Resolution::between(previous.estado.as_deref(), request.estado.as_deref())
    else {
        debug!(
            request_id,
            before = ?previous.estado,
            after = ?request.estado,
            "Linking request state change is not a resolution"
        );
        return Ok(Outcome::Skipped {
            reason: SkipReason::IrrelevantTransition,
        });
    };

    let Some(familiar_id) = request.familiar_id.as_deref() else {
        info!(request_id, "Resolved linking request has no family member");
        return Ok(Outcome::Skipped {
            reason: SkipReason::MissingFamilyMember,
        });
    };

    let profile = ctx
        .resolver
        .resolve_identity(familiar_id)
        .await
        .map_err(NotifierError::store)?;

    let Some(profile) = profile else {
        info!(
            request_id,
            familiar_id, "Family member has not signed in yet, notifying by email only"
        );
        let email = send_resolution_email(ctx, &request, resolution, None).await;
        return Ok(Outcome::EmailOnly { email });
    };

    let tokens = resolve_tokens(&profile);
    let email = send_resolution_email(ctx, &request, resolution, Some(&profile)).await;

    if tokens.is_empty() {
        info!(request_id, familiar_id, "Family member has no registered device");
        return Ok(Outcome::EmailOnly { email });
    }

    let payload = PushPayload::new(
        resolution.push_title(),
        resolution.push_body(request.student_name()),
        LINKING_CHANNEL,
    )
    .with_data("tipo", "solicitud_procesada")
    .with_data("solicitudId", request_id)
    .with_data("estado", resolution.as_str())
    .with_data("click_action", "SOLICITUD_PROCESADA");

    let attempts = dispatch_all(&ctx.fcm, &tokens, &payload).await;
    let result = aggregate(&attempts);

    info!(
        request_id,
        estado = resolution.as_str(),
        success_count = result.success_count,
        failure_count = result.failure_count,
        "Linking resolution notifications sent"
    );

    Ok(Outcome::Delivered {
        result,
        attempts,
        email: Some(email),
    })
}

/// Profile contact data wins over the copy stored on the request.
async fn send_resolution_email(
    ctx: &Context,
    request: &LinkingRequest,
    resolution: Resolution,
    profile: Option<&UserProfile>,
) -> EmailStatus {
    let address = profile
        .and_then(UserProfile::email)
        .or(request.familiar_email.as_deref());

    let Some(address) = address else {
        warn!("No email address known for family member, email skipped");
        return EmailStatus::NoAddress;
    };

    let name = profile
        .and_then(UserProfile::nombre)
        .or(request.familiar_nombre.as_deref())
        .unwrap_or("Familiar");

    let email = EmailRequest {
        destinatario: address.to_string(),
        asunto: resolution.email_subject(request.student_name()),
        nombre: name.to_string(),
        tipo_plantilla: EMAIL_TEMPLATE.to_string(),
        nombre_alumno: request.student_name().to_string(),
        estado: resolution.as_str().to_string(),
        observaciones: request.observaciones.clone().unwrap_or_default(),
    };

    match ctx.relay.send_email(&email).await {
        Ok(_) => {
            info!(recipient = address, "Resolution email sent");
            EmailStatus::Sent
        }
        Err(e) => {
            warn!(recipient = address, error = %e, "Resolution email failed");
            EmailStatus::Failed {
                error: e.to_string(),
            }
        }
    }
}
