use std::sync::Arc;

use event_notifier::{
    clients::{
        apps_script::AppsScriptClient,
        auth::IdentityToolkitClient,
        bearer::{BearerSource, StaticBearer},
        fcm::FcmClient,
        memory::InMemoryStore,
        store::DocumentStore,
    },
    config::MessageDelivery,
    handlers::Context,
    models::{
        event::{ChangeKind, TriggerEvent},
        retry::RetryConfig,
    },
    resolver::Resolver,
};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub const PROJECT_ID: &str = "test-project";
pub const FCM_PATH: &str = "/v1/projects/test-project/messages:send";
pub const RELAY_PATH: &str = "/relay";
pub const EMAIL_PATH: &str = "/email";

pub fn accounts_path(action: &str) -> String {
    format!("/v1/projects/{}/accounts:{}", PROJECT_ID, action)
}

/// Single attempt so failure tests do not sleep.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 1,
        initial_delay_ms: 10,
        max_delay_ms: 10,
        backoff_multiplier: 1,
    }
}

pub struct TestContext {
    pub server: MockServer,
    pub store: Arc<InMemoryStore>,
    pub context: Context,
}

/// Every outbound API points at one mock server; documents live in memory.
pub async fn test_context(delivery: MessageDelivery) -> TestContext {
    let server = MockServer::start().await;
    let store = Arc::new(InMemoryStore::new());
    let documents: Arc<dyn DocumentStore> = store.clone();
    let bearer: Arc<dyn BearerSource> = Arc::new(StaticBearer("test-token".to_string()));

    let context = Context {
        store: documents.clone(),
        resolver: Resolver::new(documents, "dni"),
        fcm: FcmClient::with_endpoint(&server.uri(), PROJECT_ID, bearer.clone())
            .expect("fcm client"),
        relay: AppsScriptClient::with_urls(
            &format!("{}{}", server.uri(), RELAY_PATH),
            &format!("{}{}", server.uri(), EMAIL_PATH),
            fast_retry(),
        )
        .expect("relay client"),
        auth: IdentityToolkitClient::with_endpoint(&server.uri(), PROJECT_ID, bearer)
            .expect("auth client"),
        message_delivery: delivery,
    };

    TestContext {
        server,
        store,
        context,
    }
}

pub async fn mount_fcm_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(FCM_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "name": "projects/test-project/messages/1" })),
        )
        .mount(server)
        .await;
}

pub async fn mount_relay_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(RELAY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .mount(server)
        .await;
}

pub async fn mount_email_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(EMAIL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "OK" })))
        .mount(server)
        .await;
}

/// Bodies of every request the mock server saw on `request_path`.
pub async fn bodies_at(server: &MockServer, request_path: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == request_path)
        .map(|request| serde_json::from_slice(&request.body).unwrap_or(Value::Null))
        .collect()
}

/// Query strings of every request the mock server saw on `request_path`.
pub async fn queries_at(server: &MockServer, request_path: &str) -> Vec<Vec<(String, String)>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == request_path)
        .map(|request| request.url.query_pairs().into_owned().collect())
        .collect()
}

pub fn fields(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

pub fn created(collection: &str, document_id: &str, after: Value) -> TriggerEvent {
    TriggerEvent {
        id: uuid::Uuid::new_v4().to_string(),
        kind: ChangeKind::Created,
        collection: collection.to_string(),
        document_id: document_id.to_string(),
        before: None,
        after: Some(fields(after)),
    }
}

pub fn updated(collection: &str, document_id: &str, before: Value, after: Value) -> TriggerEvent {
    TriggerEvent {
        id: uuid::Uuid::new_v4().to_string(),
        kind: ChangeKind::Updated,
        collection: collection.to_string(),
        document_id: document_id.to_string(),
        before: Some(fields(before)),
        after: Some(fields(after)),
    }
}

pub fn user_with_token(dni: &str, token: &str) -> Value {
    json!({
        "dni": dni,
        "nombre": format!("Usuario {}", dni),
        "preferencias": { "notificaciones": { "fcmToken": token } }
    })
}
