use anyhow::{Error, Result};
use async_trait::async_trait;

use crate::models::document::{Document, Fields};

/// The document database the triggers fire on.
///
/// Absent documents are `Ok(None)`; `Err` means the store itself failed and is
/// fatal to the invocation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error>;

    /// First document whose `field` equals `value`.
    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>, Error>;

    async fn list(&self, collection: &str) -> Result<Vec<Document>, Error>;

    /// Overwrites the given top-level fields of an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), Error>;

    /// Creates a document with a generated id and returns the id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String, Error>;

    async fn health_check(&self) -> Result<(), Error>;

    fn backend(&self) -> &'static str;
}
