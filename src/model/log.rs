use serde::{Deserialize, Serialize};

use crate::model::schema::{FieldSpec, Schema, SelectorSource, SelectorSpec};
use crate::model::value::{FieldKind, FieldValue};
use crate::model::{Entity, ResourceKind};

static FIELDS: &[FieldSpec] = &[
    FieldSpec::column("timestamp", "When", FieldKind::Text, 20).read_only(),
    FieldSpec::column("action", "Action", FieldKind::Text, 16).read_only(),
    FieldSpec::column("item_name", "Item", FieldKind::Text, 20).read_only(),
    FieldSpec::column("user", "User", FieldKind::Text, 12).read_only(),
    FieldSpec::column("details", "Details", FieldKind::Text, 40).read_only(),
];

static SCHEMA: Schema = Schema {
    fields: FIELDS,
    searchable: &["action", "item_name", "user", "timestamp", "details"],
    selectors: &[SelectorSpec {
        field: "action",
        label: "Action",
        source: SelectorSource::Distinct,
    }],
};

/// Read-only audit record from `GET /api/logs/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub details: Option<String>,
}

impl Entity for LogEntry {
    const KIND: ResourceKind = ResourceKind::Logs;

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn server_id(&self) -> Option<i64> {
        None
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "action" => FieldValue::text(&self.action),
            "item_name" => FieldValue::optional_text(self.item_name.as_deref()),
            "user" => FieldValue::optional_text(self.user.as_deref()),
            "timestamp" => FieldValue::text(&self.timestamp),
            "details" => FieldValue::optional_text(self.details.as_deref()),
            _ => FieldValue::Null,
        }
    }

    fn title(&self) -> String {
        self.action.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_sparse_entries() {
        let entry: LogEntry = serde_json::from_value(json!({
            "action": "Checkout",
            "user": null,
            "timestamp": "2024-05-01 10:00:00"
        }))
        .unwrap();
        assert_eq!(entry.field("user"), FieldValue::Null);
        assert_eq!(entry.field("action"), FieldValue::text("Checkout"));
        assert!(LogEntry::schema().editable().next().is_none());
    }
}
