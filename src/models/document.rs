use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

pub type Fields = Map<String, Value>;

/// A document read from (or about to be written to) a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Non-empty string at `key`.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        str_at(&self.fields, &[key])
    }
}

/// Walks `path` through nested maps and returns the value there when it is a
/// non-empty string.
pub fn str_at<'a>(fields: &'a Fields, path: &[&str]) -> Option<&'a str> {
    let (last, parents) = path.split_last()?;

    let mut current = fields;
    for key in parents {
        current = current.get(*key)?.as_object()?;
    }

    current
        .get(*last)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Key of the single-entry object that marks a point in time inside
/// `Fields`. Stores write it as their native timestamp type.
pub const TIMESTAMP_KEY: &str = "$timestamp";

pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    json!({ TIMESTAMP_KEY: at.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

/// The RFC 3339 text of a timestamp marker.
pub fn timestamp_text(value: &Value) -> Option<&str> {
    match value.as_object() {
        Some(map) if map.len() == 1 => map.get(TIMESTAMP_KEY)?.as_str(),
        _ => None,
    }
}

pub fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp_text(value)?)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Collection names the triggers and handlers work with.
pub mod collections {
    pub const USERS: &str = "usuarios";
    pub const UNIFIED_MESSAGES: &str = "unified_messages";
    pub const MESSAGES: &str = "messages";
    pub const ACTIVITY_LOGS: &str = "registros_actividad";
    pub const LINKING_REQUESTS: &str = "solicitudes_vinculacion";
    pub const DELETION_REQUESTS: &str = "user_deletion_requests";
}
