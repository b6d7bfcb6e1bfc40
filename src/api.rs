use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result};
use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{
    clients::{
        apps_script::AppsScriptClient,
        auth::IdentityToolkitClient,
        bearer::{BearerSource, CLOUD_PLATFORM_SCOPES, FCM_SCOPES, GcpBearer},
        fcm::FcmClient,
        firestore::FirestoreClient,
        health::HealthChecker,
        idempotency::{IdempotencyStore, InMemoryIdempotency},
        redis::RedisClient,
        store::DocumentStore,
    },
    config::Config,
    error::NotifierError,
    handlers::{Context, EventResponse, admin, handle_event},
    models::{event::TriggerEvent, health::HealthStatus},
    resolver::Resolver,
};

pub struct AppState {
    pub context: Context,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub health_checker: HealthChecker,
    pub admin_api_key: String,
    pub delete_user_api_key: String,
}

/// Builds every client once from configuration.
pub async fn build_state(config: &Config) -> Result<AppState, Error> {
    let provider = gcp_auth::provider().await?;
    let platform: Arc<dyn BearerSource> =
        Arc::new(GcpBearer::new(provider.clone(), CLOUD_PLATFORM_SCOPES));
    let messaging: Arc<dyn BearerSource> = Arc::new(GcpBearer::new(provider, FCM_SCOPES));

    let store: Arc<dyn DocumentStore> = Arc::new(FirestoreClient::new(config, platform.clone())?);

    let idempotency: Arc<dyn IdempotencyStore> = match config.redis_url.as_deref() {
        Some(url) => Arc::new(RedisClient::connect(config, url).await?),
        None => {
            warn!("REDIS_URL not set, deduplicating events in process memory only");
            Arc::new(InMemoryIdempotency::new(config.idempotency_ttl_seconds))
        }
    };

    let context = Context {
        store: store.clone(),
        resolver: Resolver::new(store.clone(), config.profile_fallback_field.clone()),
        fcm: FcmClient::new(config, messaging)?,
        relay: AppsScriptClient::new(config)?,
        auth: IdentityToolkitClient::new(config, platform)?,
        message_delivery: config.message_delivery,
    };

    Ok(AppState {
        context,
        health_checker: HealthChecker::new(store, idempotency.clone()),
        idempotency,
        admin_api_key: config.admin_api_key.clone(),
        delete_user_api_key: config.delete_user_api_key.clone(),
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let admin_routes = Router::new()
        .route("/requestUserDeletion", post(admin::request_user_deletion))
        .route("/updateUserFirebaseUid", post(admin::update_user_firebase_uid))
        .route("/syncUserCustomClaims", post(admin::sync_user_custom_claims))
        .layer(cors);

    Router::new()
        .route("/events", post(receive_event))
        .route("/health", get(health_check))
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(config: Config) -> Result<(), Error> {
    let state = Arc::new(build_state(&config).await?);
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Event notifier listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn receive_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<TriggerEvent>,
) -> Result<Json<EventResponse>, NotifierError> {
    handle_event(&state.context, state.idempotency.as_ref(), event)
        .await
        .map(Json)
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}
