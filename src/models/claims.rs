use serde::{Deserialize, Serialize};

use crate::models::profile::Membership;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Teacher,
    CentreAdmin,
    AppAdmin,
}

/// Membership tag to role. Tags not listed grant nothing.
const ROLE_TAGS: &[(&str, Role)] = &[
    ("PROFESOR", Role::Teacher),
    ("ADMIN_CENTRO", Role::CentreAdmin),
    ("ADMIN_APP", Role::AppAdmin),
];

impl Role {
    pub fn from_tag(tag: &str) -> Option<Self> {
        ROLE_TAGS
            .iter()
            .find(|(known, _)| *known == tag)
            .map(|(_, role)| *role)
    }
}

/// Custom claims attached to an auth-directory account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomClaims {
    pub dni: String,
    pub is_profesor: bool,
    pub is_admin: bool,
    pub is_admin_app: bool,
}

impl CustomClaims {
    pub fn derive(dni: impl Into<String>, memberships: &[Membership]) -> Self {
        memberships
            .iter()
            .filter_map(|membership| Role::from_tag(&membership.tipo))
            .fold(
                Self {
                    dni: dni.into(),
                    ..Self::default()
                },
                Self::grant,
            )
    }

    fn grant(mut self, role: Role) -> Self {
        match role {
            Role::Teacher => self.is_profesor = true,
            Role::CentreAdmin => self.is_admin = true,
            Role::AppAdmin => self.is_admin_app = true,
        }
        self
    }
}
