use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    document::{Document, Fields, str_at},
    event::{non_empty_string, only_true, string_or_empty},
};

/// A membership entry from a user's `perfiles` list. Each field is read on
/// its own, so a malformed sibling never hides the `tipo`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Membership {
    #[serde(deserialize_with = "string_or_empty")]
    pub tipo: String,
    #[serde(deserialize_with = "non_empty_string")]
    pub centro_id: Option<String>,
    #[serde(deserialize_with = "only_true")]
    pub verificado: bool,
}

/// A user document from the `usuarios` collection.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: String,
    pub fields: Fields,
}

impl UserProfile {
    pub fn from_document(document: Document) -> Self {
        Self {
            id: document.id,
            fields: document.fields,
        }
    }

    pub fn dni(&self) -> Option<&str> {
        str_at(&self.fields, &["dni"])
    }

    pub fn nombre(&self) -> Option<&str> {
        str_at(&self.fields, &["nombre"])
    }

    pub fn apellidos(&self) -> Option<&str> {
        str_at(&self.fields, &["apellidos"])
    }

    pub fn email(&self) -> Option<&str> {
        str_at(&self.fields, &["email"])
    }

    /// Auth-directory uid, ignoring blank values.
    pub fn firebase_uid(&self) -> Option<&str> {
        str_at(&self.fields, &["firebaseUid"]).filter(|uid| !uid.trim().is_empty())
    }

    /// Memberships that parse; malformed entries are skipped.
    pub fn memberships(&self) -> Vec<Membership> {
        memberships_of(&self.fields)
    }

    pub fn is_verified_admin_of(&self, centro_id: &str) -> bool {
        self.memberships().iter().any(|m| {
            m.tipo == "ADMIN_CENTRO" && m.centro_id.as_deref() == Some(centro_id) && m.verificado
        })
    }
}

pub fn memberships_of(fields: &Fields) -> Vec<Membership> {
    match fields.get("perfiles") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}
