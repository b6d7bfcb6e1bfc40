use serde::Deserialize;
use serde_json::Value;

use crate::models::{document::Fields, event::non_empty_string};

pub const PENDING: &str = "PENDIENTE";
pub const APPROVED: &str = "APROBADA";
pub const REJECTED: &str = "RECHAZADA";

/// A family member's request to be linked to a student.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkingRequest {
    #[serde(deserialize_with = "non_empty_string")]
    pub estado: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub familiar_id: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub familiar_email: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub familiar_nombre: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub nombre_familiar: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub alumno_nombre: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub observaciones: Option<String>,

    #[serde(deserialize_with = "non_empty_string")]
    pub centro_id: Option<String>,
}

impl LinkingRequest {
    pub fn from_fields(fields: &Fields) -> Self {
        serde_json::from_value(Value::Object(fields.clone())).unwrap_or_default()
    }

    pub fn student_name(&self) -> &str {
        self.alumno_nombre.as_deref().unwrap_or("el alumno")
    }
}

/// Resolution of a pending request, the only transition that notifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Approved,
    Rejected,
}

impl Resolution {
    pub fn between(before: Option<&str>, after: Option<&str>) -> Option<Self> {
        if before != Some(PENDING) {
            return None;
        }

        match after {
            Some(APPROVED) => Some(Self::Approved),
            Some(REJECTED) => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => APPROVED,
            Self::Rejected => REJECTED,
        }
    }

    pub fn push_title(&self) -> &'static str {
        match self {
            Self::Approved => "Solicitud aprobada",
            Self::Rejected => "Solicitud rechazada",
        }
    }

    pub fn push_body(&self, student: &str) -> String {
        match self {
            Self::Approved => format!("Tu solicitud para vincularte con {student} ha sido aprobada"),
            Self::Rejected => {
                format!("Tu solicitud para vincularte con {student} ha sido rechazada")
            }
        }
    }

    pub fn email_subject(&self, student: &str) -> String {
        match self {
            Self::Approved => format!("Solicitud Aprobada - Vinculación con {student}"),
            Self::Rejected => format!("Solicitud Rechazada - Vinculación con {student}"),
        }
    }
}
