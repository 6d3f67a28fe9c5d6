use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{Error, Result};
use crate::model::schema::{FieldSpec, Schema, SelectorSource, SelectorSpec};
use crate::model::value::{FieldKind, FieldValue};
use crate::model::{Entity, ResourceKind};

pub const ROLE_NAMES: &[&str] = &["admin", "manager", "supervisor", "worker", "temp"];
pub const STATUS_NAMES: &[&str] = &["active", "inactive"];

static FIELDS: &[FieldSpec] = &[
    FieldSpec::column("id", "ID", FieldKind::Number, 5).read_only(),
    FieldSpec::column("username", "Username", FieldKind::Text, 18),
    FieldSpec::column("full_name", "Full name", FieldKind::Text, 20).read_only(),
    FieldSpec::column("role", "Role", FieldKind::Text, 11).with_choices(ROLE_NAMES),
    FieldSpec::column("unique_id", "Badge", FieldKind::Text, 8).read_only(),
    FieldSpec::column("is_active", "Active", FieldKind::Bool, 7),
    FieldSpec::column("password", "Password", FieldKind::Text, 10).secret(),
    FieldSpec::column("status", "Status", FieldKind::Text, 8)
        .read_only()
        .hidden(),
];

static SCHEMA: Schema = Schema {
    fields: FIELDS,
    searchable: &["username", "role", "unique_id", "status"],
    selectors: &[
        SelectorSpec {
            field: "role",
            label: "Role",
            source: SelectorSource::Fixed(ROLE_NAMES),
        },
        SelectorSpec {
            field: "status",
            label: "Status",
            source: SelectorSource::Fixed(STATUS_NAMES),
        },
    ],
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Supervisor,
    #[default]
    Worker,
    Temp,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub unique_id: String,
}

impl User {
    pub fn status(&self) -> &'static str {
        if self.is_active {
            "active"
        } else {
            "inactive"
        }
    }
}

impl Entity for User {
    const KIND: ResourceKind = ResourceKind::Users;

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn server_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => FieldValue::Number(self.id),
            "username" => FieldValue::text(&self.username),
            "full_name" => FieldValue::text(&self.full_name),
            "role" => FieldValue::text(&self.role),
            "unique_id" => FieldValue::text(&self.unique_id),
            "is_active" => FieldValue::Bool(self.is_active),
            "status" => FieldValue::text(self.status()),
            _ => FieldValue::Null,
        }
    }

    fn title(&self) -> String {
        self.username.clone()
    }
}

/// Body for `POST /api/users/`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct UserDraft {
    pub username: String,
    pub role: Role,
    pub password: String,
}

impl UserDraft {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::validation("username is required"));
        }
        if self.password.is_empty() {
            return Err(Error::validation("a password is required for new users"));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample(id: i64, username: &str, role: &str, is_active: bool) -> User {
    User {
        id,
        username: username.to_string(),
        full_name: String::new(),
        role: role.to_string(),
        is_active,
        unique_id: format!("U{id:05}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn password_never_decoded_and_active_defaults_true() {
        let user: User = serde_json::from_value(json!({
            "id": 1, "username": "ana", "role": "worker", "unique_id": "AB12CD"
        }))
        .unwrap();
        assert!(user.is_active);
        assert_eq!(user.field("password"), FieldValue::Null);
        assert_eq!(user.field("status"), FieldValue::text("active"));
    }

    #[test]
    fn draft_serializes_role_lowercase() {
        let draft = UserDraft {
            username: "bo".into(),
            role: Role::Supervisor,
            password: "pw".into(),
        };
        draft.validate().unwrap();
        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            json!({"username": "bo", "role": "supervisor", "password": "pw"})
        );
    }

    #[test]
    fn draft_without_password_is_rejected() {
        let draft = UserDraft {
            username: "bo".into(),
            ..UserDraft::default()
        };
        assert!(draft.validate().unwrap_err().is_validation());
    }
}
