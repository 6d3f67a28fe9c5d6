use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::model::{FieldValue, Schema};
use crate::store::EntityKey;

/// Partial field changes for one row, in the order they were made.
pub type Patch = IndexMap<String, FieldValue>;

/// Unsaved edits keyed by row. Entries never leak into the collection.
#[derive(Debug, Clone, Default)]
pub struct EditBuffer {
    entries: HashMap<EntityKey, Patch>,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_field(&mut self, key: EntityKey, field: impl Into<String>, value: FieldValue) {
        self.entries.entry(key).or_default().insert(field.into(), value);
    }

    pub fn clear(&mut self, key: &EntityKey) -> Option<Patch> {
        self.entries.remove(key)
    }

    /// The accumulated changes for `key`, empty when there are none.
    pub fn get(&self, key: &EntityKey) -> Patch {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    pub fn entry(&self, key: &EntityKey) -> Option<&Patch> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &EntityKey, field: &str) -> Option<&FieldValue> {
        self.entries.get(key).and_then(|patch| patch.get(field))
    }

    pub fn is_dirty(&self, key: &EntityKey) -> bool {
        self.entries.get(key).is_some_and(|patch| !patch.is_empty())
    }

    pub fn dirty_keys(&self) -> Vec<EntityKey> {
        let mut keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, patch)| !patch.is_empty())
            .map(|(key, _)| *key)
            .collect();
        keys.sort();
        keys
    }

    /// Drops the fields the server has acknowledged. A field edited again
    /// after `sent` was captured keeps its newer value. Returns whether
    /// anything is still pending for `key`.
    pub fn confirm(&mut self, key: &EntityKey, sent: &Patch) -> bool {
        let Some(patch) = self.entries.get_mut(key) else {
            return false;
        };
        patch.retain(|field, value| sent.get(field) != Some(value));
        if patch.is_empty() {
            self.entries.remove(key);
            false
        } else {
            true
        }
    }

    pub fn retain_keys(&mut self, mut keep: impl FnMut(&EntityKey) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// JSON body for a partial update. Secret fields left empty are omitted so
/// an untouched password box never resets a password.
pub fn patch_to_json(patch: &Patch, schema: &Schema) -> Value {
    let mut body = Map::new();
    for (field, value) in patch {
        let secret = schema.field(field).is_some_and(|spec| spec.secret);
        if secret && matches!(value, FieldValue::Text(text) if text.is_empty()) {
            continue;
        }
        body.insert(field.clone(), value.to_json());
    }
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entity, User};
    use serde_json::json;

    #[test]
    fn set_field_merges_into_one_entry() {
        let mut buffer = EditBuffer::new();
        let key = EntityKey::Server(1);
        buffer.set_field(key, "quantity", FieldValue::Number(3));
        buffer.set_field(key, "name", FieldValue::text("Bolt"));
        buffer.set_field(key, "quantity", FieldValue::Number(4));

        let patch = buffer.get(&key);
        assert_eq!(patch.len(), 2);
        assert_eq!(patch["quantity"], FieldValue::Number(4));
        assert!(buffer.get(&EntityKey::Server(2)).is_empty());
        assert_eq!(buffer.dirty_keys(), vec![key]);

        buffer.clear(&key);
        assert!(!buffer.is_dirty(&key));
    }

    #[test]
    fn confirm_keeps_fields_edited_after_send() {
        let mut buffer = EditBuffer::new();
        let key = EntityKey::Server(7);
        buffer.set_field(key, "quantity", FieldValue::Number(15));
        buffer.set_field(key, "name", FieldValue::text("Bolt"));
        let sent = buffer.get(&key);

        buffer.set_field(key, "quantity", FieldValue::Number(16));
        assert!(buffer.confirm(&key, &sent));
        let left = buffer.get(&key);
        assert_eq!(left.len(), 1);
        assert_eq!(left["quantity"], FieldValue::Number(16));

        assert!(!buffer.confirm(&key, &left));
        assert!(buffer.is_empty());
    }

    #[test]
    fn payload_contains_exactly_the_buffered_fields() {
        let mut buffer = EditBuffer::new();
        let key = EntityKey::Server(3);
        buffer.set_field(key, "role", FieldValue::text("manager"));
        buffer.set_field(key, "password", FieldValue::text(""));

        let body = patch_to_json(&buffer.get(&key), User::schema());
        assert_eq!(body, json!({"role": "manager"}));

        buffer.set_field(key, "password", FieldValue::text("s3cret"));
        let body = patch_to_json(&buffer.get(&key), User::schema());
        assert_eq!(body, json!({"role": "manager", "password": "s3cret"}));
    }

    #[test]
    fn retain_keys_prunes_vanished_rows() {
        let mut buffer = EditBuffer::new();
        buffer.set_field(EntityKey::Server(1), "name", FieldValue::text("a"));
        buffer.set_field(EntityKey::Server(2), "name", FieldValue::text("b"));
        buffer.retain_keys(|key| *key == EntityKey::Server(2));
        assert_eq!(buffer.dirty_keys(), vec![EntityKey::Server(2)]);
    }
}
