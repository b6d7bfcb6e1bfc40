use std::{sync::Arc, time::Duration};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::{
    clients::{bearer::BearerSource, store::DocumentStore},
    config::Config,
    models::document::{Document, Fields, TIMESTAMP_KEY, collections, timestamp_text},
};

const LIST_PAGE_SIZE: &str = "300";

/// Firestore over its REST v1 API.
pub struct FirestoreClient {
    http_client: Client,
    documents_url: Url,
    bearer: Arc<dyn BearerSource>,
}

#[derive(Debug, Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<FirestoreDocument>,
}

impl FirestoreDocument {
    fn into_document(self) -> Document {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Document::new(id, from_firestore_fields(&self.fields))
    }
}

impl FirestoreClient {
    pub fn new(config: &Config, bearer: Arc<dyn BearerSource>) -> Result<Self, Error> {
        Self::with_endpoint(&config.firestore_base_url, &config.gcp_project_id, bearer)
    }

    pub fn with_endpoint(
        base_url: &str,
        project_id: &str,
        bearer: Arc<dyn BearerSource>,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        let documents_url = Url::parse(&format!(
            "{}/v1/projects/{}/databases/(default)/documents",
            base_url.trim_end_matches('/'),
            project_id
        ))?;

        info!(project_id, "Firestore client initialized");

        Ok(Self {
            http_client,
            documents_url,
            bearer,
        })
    }

    /// Appends each segment percent-encoded, so ids never split the path.
    fn document_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Firestore base URL cannot take path segments"))?
            .extend(segments);
        Ok(url)
    }

    async fn check(operation: &str, response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(anyhow!(
            "Firestore {} failed with status {}: {}",
            operation,
            status,
            body
        ))
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, Error> {
        let url = self.document_url(&[collection, id])?;
        debug!(collection, id, "Fetching document");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.bearer.bearer().await?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let document: FirestoreDocument = Self::check("get", response).await?.json().await?;
        Ok(Some(document.into_document()))
    }

    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Document>, Error> {
        let url = format!("{}:runQuery", self.documents_url);
        debug!(collection, field, "Querying document by field");

        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": { "stringValue": value }
                    }
                },
                "limit": 1
            }
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.bearer.bearer().await?)
            .json(&query)
            .send()
            .await?;

        let items: Vec<RunQueryItem> = Self::check("runQuery", response).await?.json().await?;

        Ok(items
            .into_iter()
            .find_map(|item| item.document)
            .map(FirestoreDocument::into_document))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, Error> {
        let url = self.document_url(&[collection])?;
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(url.clone())
                .bearer_auth(self.bearer.bearer().await?)
                .query(&[("pageSize", LIST_PAGE_SIZE)]);

            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListDocumentsResponse =
                Self::check("list", request.send().await?).await?.json().await?;

            documents.extend(page.documents.into_iter().map(FirestoreDocument::into_document));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(collection, count = documents.len(), "Listed documents");
        Ok(documents)
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), Error> {
        let url = self.document_url(&[collection, id])?;

        let mut params: Vec<(&str, &str)> = fields
            .keys()
            .map(|key| ("updateMask.fieldPaths", key.as_str()))
            .collect();
        params.push(("currentDocument.exists", "true"));

        let response = self
            .http_client
            .patch(url)
            .bearer_auth(self.bearer.bearer().await?)
            .query(&params)
            .json(&json!({ "fields": to_firestore_fields(&fields) }))
            .send()
            .await?;

        Self::check("update", response).await?;
        debug!(collection, id, "Document updated");
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String, Error> {
        let url = self.document_url(&[collection])?;

        let response = self
            .http_client
            .post(url)
            .bearer_auth(self.bearer.bearer().await?)
            .json(&json!({ "fields": to_firestore_fields(&fields) }))
            .send()
            .await?;

        let document: FirestoreDocument = Self::check("create", response).await?.json().await?;
        let created = document.into_document();
        debug!(collection, id = %created.id, "Document created");
        Ok(created.id)
    }

    async fn health_check(&self) -> Result<(), Error> {
        let url = self.document_url(&[collections::USERS])?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(self.bearer.bearer().await?)
            .query(&[("pageSize", "1"), ("mask.fieldPaths", "dni")])
            .send()
            .await?;

        Self::check("health check", response).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "firestore"
    }
}

pub fn to_firestore_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), to_firestore_value(value)))
        .collect()
}

pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(to_firestore_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => match timestamp_text(value) {
            Some(at) => json!({ "timestampValue": at }),
            None => json!({ "mapValue": { "fields": to_firestore_fields(map) } }),
        },
    }
}

pub fn from_firestore_fields(fields: &Map<String, Value>) -> Fields {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), from_firestore_value(value)))
        .collect()
}

/// Converts a typed Firestore value into plain JSON. Timestamps come back as
/// timestamp markers. References and bytes become their string forms.
pub fn from_firestore_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|typed| typed.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "timestampValue" => json!({ TIMESTAMP_KEY: inner }),
        "booleanValue" | "doubleValue" | "stringValue" | "referenceValue" | "bytesValue"
        | "geoPointValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(from_firestore_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(from_firestore_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}
