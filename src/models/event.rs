use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::document::Fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// One document write as delivered by the trigger runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    pub id: String,
    pub kind: ChangeKind,
    pub collection: String,
    pub document_id: String,

    #[serde(default)]
    pub before: Option<Fields>,

    #[serde(default)]
    pub after: Option<Fields>,
}

/// Fields of a message-like record that drive recipient resolution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventRecord {
    #[serde(deserialize_with = "non_empty_string")]
    pub sender_id: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub sender_name: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub receiver_id: Option<String>,

    #[serde(deserialize_with = "string_list")]
    pub receivers_ids: Vec<String>,

    #[serde(deserialize_with = "string_list")]
    pub participants_ids: Vec<String>,

    #[serde(rename = "type", deserialize_with = "non_empty_string")]
    pub kind: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub content: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub title: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub conversation_id: Option<String>,
}

impl EventRecord {
    pub fn from_fields(fields: &Fields) -> Self {
        // Every field is lenient, so only a non-object could fail here.
        serde_json::from_value(Value::Object(fields.clone())).unwrap_or_default()
    }
}

pub(crate) fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    })
}

/// Any non-string reads as an empty string.
pub(crate) fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(non_empty_string(deserializer)?.unwrap_or_default())
}

/// Only a JSON `true` is true.
pub(crate) fn only_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
