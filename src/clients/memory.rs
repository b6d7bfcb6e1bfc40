use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    clients::store::DocumentStore,
    models::document::{Document, Fields},
};

type Collections = HashMap<String, BTreeMap<String, Fields>>;

/// Process-local document store, used for local runs and tests.
#[derive(Default)]
pub struct InMemoryStore {
    collections: Mutex<Collections>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a document. `fields` must be a JSON object.
    pub fn insert(&self, collection: &str, id: &str, fields: Value) {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Fields::new(),
        };

        if let Ok(mut collections) = self.collections.lock() {
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields);
        }
    }

    pub fn snapshot(&self, collection: &str, id: &str) -> Option<Fields> {
        self.collections
            .lock()
            .ok()?
            .get(collection)?
            .get(id)
            .cloned()
    }

    /// Makes every subsequent operation fail, as if the backend were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, Error> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(anyhow!("Document store unavailable"));
        }

        self.collections
            .lock()
            .map_err(|_| anyhow!("Document store lock poisoned"))
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>, Error> {
        let collections = self.lock()?;
        Ok(collections.get(collection).and_then(|docs| {
            docs.iter()
                .find(|(_, fields)| fields.get(field).and_then(Value::as_str) == Some(value))
                .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
        }))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, Error> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), Error> {
        let mut collections = self.lock()?;
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| anyhow!("No document to update: {}/{}", collection, id))?;

        existing.extend(fields);
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, Error> {
        let mut collections = self.lock()?;
        let id = Uuid::new_v4().simple().to_string();

        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), fields);

        Ok(id)
    }

    async fn health_check(&self) -> Result<(), Error> {
        self.lock().map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
