use std::{collections::HashMap, sync::Arc, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{idempotency::IdempotencyStore, store::DocumentStore},
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

pub struct HealthChecker {
    store: Arc<dyn DocumentStore>,
    idempotency: Arc<dyn IdempotencyStore>,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn DocumentStore>, idempotency: Arc<dyn IdempotencyStore>) -> Self {
        Self { store, idempotency }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let store_health = self.check_document_store().await;
        checks.insert("document_store".to_string(), store_health);

        let idempotency_health = self.check_idempotency_store().await;
        checks.insert("idempotency_store".to_string(), idempotency_health);

        let overall_status = self.determine_overall_status(&checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now(),
            checks,
        }
    }

    async fn check_document_store(&self) -> ServiceHealth {
        let start = Instant::now();
        let backend = self.store.backend();

        match self.store.health_check().await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, backend, "Document store health check passed");
                ServiceHealth::healthy(elapsed).with_backend(backend)
            }
            Err(e) => {
                warn!(error = %e, backend, "Document store health check failed");
                ServiceHealth::unhealthy(format!("Health check failed: {}", e)).with_backend(backend)
            }
        }
    }

    async fn check_idempotency_store(&self) -> ServiceHealth {
        let start = Instant::now();
        let backend = self.idempotency.backend();

        match self.idempotency.health_check().await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, backend, "Idempotency store health check passed");
                ServiceHealth::healthy(elapsed).with_backend(backend)
            }
            Err(e) => {
                warn!(error = %e, backend, "Idempotency store health check failed");
                ServiceHealth::unhealthy(format!("Ping failed: {}", e)).with_backend(backend)
            }
        }
    }

    /// The document store is critical; losing idempotency only degrades.
    fn determine_overall_status(&self, checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
        let critical_unhealthy = checks
            .get("document_store")
            .is_some_and(|health| health.status == HealthStatus::Unhealthy);

        let has_unhealthy = checks
            .values()
            .any(|health| health.status == HealthStatus::Unhealthy);

        if critical_unhealthy {
            HealthStatus::Unhealthy
        } else if has_unhealthy {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
