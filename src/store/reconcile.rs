use std::collections::HashMap;

use serde_json::Value;

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::model::{Entity, FieldValue};
use crate::store::buffer::{patch_to_json, EditBuffer, Patch};
use crate::store::collection::{Collection, Row};
use crate::store::EntityKey;
use crate::view::{compute_view, FilterState, Page};

/// Where a row is in its edit/save/delete lifecycle.
///
/// `Idle -> Editing -> Saving -> Idle | Editing` for saves and
/// `Idle | Editing -> Deleting -> removed | previous` for deletes.
#[derive(Debug, Clone, PartialEq)]
pub enum RowState {
    Idle,
    Editing,
    /// Holds exactly what went on the wire so a late response only clears
    /// the fields it acknowledges.
    Saving { sent: Patch },
    Deleting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPhase {
    Idle,
    Editing,
    Saving,
    Deleting,
}

impl RowState {
    pub fn phase(&self) -> RowPhase {
        match self {
            RowState::Idle => RowPhase::Idle,
            RowState::Editing => RowPhase::Editing,
            RowState::Saving { .. } => RowPhase::Saving,
            RowState::Deleting => RowPhase::Deleting,
        }
    }
}

impl RowPhase {
    pub fn is_busy(self) -> bool {
        matches!(self, RowPhase::Saving | RowPhase::Deleting)
    }
}

/// A save that has passed client-side checks and is ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub key: EntityKey,
    pub id: i64,
    pub body: Value,
}

/// Everything one table needs: the mirrored rows, their pending edits, the
/// per-row lifecycle and the user's filter choices.
#[derive(Debug)]
pub struct ResourceView<E> {
    collection: Collection<E>,
    buffer: EditBuffer,
    states: HashMap<EntityKey, RowState>,
    row_errors: HashMap<EntityKey, Error>,
    last_error: Option<Error>,
    loaded: bool,
    pub filter: FilterState,
}

impl<E: Entity> ResourceView<E> {
    pub fn new(page_size: usize) -> Self {
        Self {
            collection: Collection::new(),
            buffer: EditBuffer::new(),
            states: HashMap::new(),
            row_errors: HashMap::new(),
            last_error: None,
            loaded: false,
            filter: FilterState::new(page_size),
        }
    }

    pub fn collection(&self) -> &Collection<E> {
        &self.collection
    }

    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn phase(&self, key: &EntityKey) -> RowPhase {
        self.states
            .get(key)
            .map(RowState::phase)
            .unwrap_or(RowPhase::Idle)
    }

    pub fn is_busy(&self, key: &EntityKey) -> bool {
        self.phase(key).is_busy()
    }

    pub fn is_dirty(&self, key: &EntityKey) -> bool {
        self.buffer.is_dirty(key)
    }

    pub fn row_error(&self, key: &EntityKey) -> Option<&Error> {
        self.row_errors.get(key)
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<Error> {
        self.last_error.take()
    }

    /// Records a failure that does not belong to a single row.
    pub fn fail(&mut self, err: Error) {
        self.last_error = Some(err);
    }

    pub fn view(&self) -> Page<'_, E> {
        compute_view(&self.collection, &self.filter)
    }

    /// The value a cell shows: the buffered edit when there is one.
    pub fn display_value(&self, row: &Row<E>, field: &str) -> FieldValue {
        self.buffer
            .value(&row.key, field)
            .cloned()
            .unwrap_or_else(|| row.entity.field(field))
    }

    /// Replaces the collection with a fresh server listing. Edits and states
    /// for rows that disappeared are dropped.
    pub fn load(&mut self, entities: Vec<E>) {
        self.collection.load(entities);
        let collection = &self.collection;
        self.buffer.retain_keys(|key| collection.contains(key));
        self.states.retain(|key, _| collection.contains(key));
        self.row_errors.retain(|key, _| collection.contains(key));
        self.loaded = true;
        tracing::debug!(kind = %E::KIND, rows = self.collection.len(), "collection loaded");
    }

    /// Parses `raw` for `field` and buffers it.
    pub fn edit(&mut self, key: EntityKey, field: &str, raw: &str) -> Result<()> {
        let value = E::schema()
            .parse_value(field, raw)
            .map_err(|err| self.reject(err))?;
        self.set_field(key, field, value)
    }

    pub fn set_field(&mut self, key: EntityKey, field: &str, value: FieldValue) -> Result<()> {
        if !self.collection.contains(&key) {
            return Err(self.reject(Error::validation(format!("no {} {key}", E::KIND.noun()))));
        }
        if self.phase(&key) == RowPhase::Deleting {
            return Err(self.reject(Error::validation(format!("{key} is being deleted"))));
        }
        match E::schema().field(field) {
            Some(spec) if spec.editable => {}
            _ => return Err(self.reject(Error::validation(format!("field '{field}' cannot be edited")))),
        }
        self.buffer.set_field(key, field, value);
        self.row_errors.remove(&key);
        if self.phase(&key) == RowPhase::Idle {
            self.states.insert(key, RowState::Editing);
        }
        Ok(())
    }

    /// Throws away unsaved edits for an idle row.
    pub fn discard(&mut self, key: &EntityKey) -> Result<()> {
        if self.is_busy(key) {
            return Err(self.reject(Error::validation(format!("{key} has a request in flight"))));
        }
        self.buffer.clear(key);
        self.states.remove(key);
        self.row_errors.remove(key);
        Ok(())
    }

    /// Moves a dirty row to `Saving` and returns the partial update to send.
    pub fn begin_save(&mut self, key: EntityKey) -> Result<SaveRequest> {
        if self.is_busy(&key) {
            return Err(self.reject(Error::validation(format!("{key} has a request in flight"))));
        }
        if !self.buffer.is_dirty(&key) {
            return Err(self.reject(Error::validation(format!("{key} has no unsaved changes"))));
        }
        let Some(id) = key.server_id() else {
            return Err(self.reject(Error::validation(format!(
                "{key} has no server id and cannot be updated"
            ))));
        };
        let sent = self.buffer.get(&key);
        let body = patch_to_json(&sent, E::schema());
        self.states.insert(key, RowState::Saving { sent });
        Ok(SaveRequest { key, id, body })
    }

    /// Applies the outcome of a save started with [`Self::begin_save`].
    pub fn complete_save(&mut self, key: EntityKey, result: Result<E>) {
        let sent = match self.states.get(&key) {
            Some(RowState::Saving { sent }) => sent.clone(),
            _ => {
                tracing::debug!(%key, "ignoring save response for row that is no longer saving");
                return;
            }
        };
        match result {
            Ok(entity) => {
                self.collection.upsert_keyed(key, entity);
                self.buffer.confirm(&key, &sent);
                self.row_errors.remove(&key);
                self.settle(key);
                tracing::info!(kind = %E::KIND, %key, "saved");
            }
            Err(err) => {
                tracing::warn!(kind = %E::KIND, %key, error = %err, "save failed");
                self.row_errors.insert(key, err.clone());
                self.last_error = Some(err);
                self.settle(key);
            }
        }
    }

    /// Moves an idle or editing row to `Deleting` and returns its server id.
    pub fn begin_delete(&mut self, key: EntityKey) -> Result<i64> {
        if !self.collection.contains(&key) {
            return Err(self.reject(Error::validation(format!("no {} {key}", E::KIND.noun()))));
        }
        if self.is_busy(&key) {
            return Err(self.reject(Error::validation(format!("{key} has a request in flight"))));
        }
        let Some(id) = key.server_id() else {
            return Err(self.reject(Error::validation(format!(
                "{key} has no server id and cannot be deleted"
            ))));
        };
        self.states.insert(key, RowState::Deleting);
        Ok(id)
    }

    pub fn complete_delete(&mut self, key: EntityKey, result: Result<()>) {
        if self.phase(&key) != RowPhase::Deleting {
            tracing::debug!(%key, "ignoring delete response for row that is no longer deleting");
            return;
        }
        match result {
            Ok(()) => {
                self.collection.remove(&key);
                self.buffer.clear(&key);
                self.states.remove(&key);
                self.row_errors.remove(&key);
                tracing::info!(kind = %E::KIND, %key, "deleted");
            }
            Err(err) => {
                tracing::warn!(kind = %E::KIND, %key, error = %err, "delete failed");
                self.row_errors.insert(key, err.clone());
                self.last_error = Some(err);
                self.settle(key);
            }
        }
    }

    /// Adds rows returned by a create call.
    pub fn apply_created(&mut self, entities: Vec<E>) -> Vec<EntityKey> {
        entities
            .into_iter()
            .map(|entity| self.collection.upsert(entity))
            .collect()
    }

    pub fn refresh(&mut self, client: &ApiClient) -> Result<usize> {
        match client.list::<E>() {
            Ok(rows) => {
                self.load(rows);
                Ok(self.collection.len())
            }
            Err(err) => Err(self.reject(err)),
        }
    }

    pub fn save(&mut self, client: &ApiClient, key: EntityKey) -> Result<()> {
        let request = self.begin_save(key)?;
        let result = client.update::<E>(request.id, request.body);
        let outcome = result.as_ref().map(|_| ()).map_err(Clone::clone);
        self.complete_save(key, result);
        outcome
    }

    /// Saves every dirty row, one partial update each.
    pub fn save_all(&mut self, client: &ApiClient) -> Vec<(EntityKey, Result<()>)> {
        let keys: Vec<EntityKey> = self
            .buffer
            .dirty_keys()
            .into_iter()
            .filter(|key| !self.is_busy(key))
            .collect();
        keys.into_iter()
            .map(|key| (key, self.save(client, key)))
            .collect()
    }

    pub fn delete(&mut self, client: &ApiClient, key: EntityKey) -> Result<()> {
        let id = self.begin_delete(key)?;
        let result = client.delete(E::KIND, id);
        let outcome = result.clone();
        self.complete_delete(key, result);
        outcome
    }

    fn settle(&mut self, key: EntityKey) {
        if self.buffer.is_dirty(&key) {
            self.states.insert(key, RowState::Editing);
        } else {
            self.states.remove(&key);
        }
    }

    fn reject(&mut self, err: Error) -> Error {
        self.last_error = Some(err.clone());
        err
    }
}
