pub mod apps_script;
pub mod auth;
pub mod bearer;
pub mod fcm;
pub mod firestore;
pub mod health;
pub mod idempotency;
pub mod memory;
pub mod redis;
pub mod store;
