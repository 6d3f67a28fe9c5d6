use crate::model::Entity;
use crate::store::EntityKey;

#[derive(Debug, Clone, PartialEq)]
pub struct Row<E> {
    pub key: EntityKey,
    pub entity: E,
}

/// Ordered mirror of one resource. Keys are unique at all times; order is
/// the order rows were first seen and carries no meaning.
#[derive(Debug, Clone)]
pub struct Collection<E> {
    rows: Vec<Row<E>>,
}

impl<E> Default for Collection<E> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<E: Entity> Collection<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key a freshly received entity would be stored under.
    pub fn key_for(entity: &E) -> EntityKey {
        entity
            .server_id()
            .map(EntityKey::Server)
            .unwrap_or_else(EntityKey::local)
    }

    /// Replaces the whole collection. Nested entities are flattened in and a
    /// repeated key keeps its first position with the last value seen.
    pub fn load(&mut self, entities: Vec<E>) {
        self.rows.clear();
        for entity in entities {
            self.upsert(entity);
        }
    }

    /// Inserts or replaces by the entity's own key and returns that key.
    pub fn upsert(&mut self, entity: E) -> EntityKey {
        let key = Self::key_for(&entity);
        self.upsert_keyed(key, entity);
        key
    }

    /// Inserts or replaces under an explicit key. Used when a response for a
    /// known row carries no identifier of its own.
    pub fn upsert_keyed(&mut self, key: EntityKey, entity: E) {
        let nested = entity.nested();
        match self.position(&key) {
            Some(index) => self.rows[index].entity = entity,
            None => self.rows.push(Row { key, entity }),
        }
        for child in nested {
            self.upsert(child);
        }
    }

    pub fn remove(&mut self, key: &EntityKey) -> Option<E> {
        let index = self.position(key)?;
        Some(self.rows.remove(index).entity)
    }

    pub fn get(&self, key: &EntityKey) -> Option<&E> {
        self.rows
            .iter()
            .find(|row| &row.key == key)
            .map(|row| &row.entity)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.position(key).is_some()
    }

    pub fn rows(&self) -> &[Row<E>] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row<E>> {
        self.rows.iter()
    }

    pub fn entities(&self) -> impl Iterator<Item = &E> {
        self.rows.iter().map(|row| &row.entity)
    }

    pub fn keys(&self) -> Vec<EntityKey> {
        self.rows.iter().map(|row| row.key).collect()
    }

    pub fn find(&self, mut predicate: impl FnMut(&E) -> bool) -> Option<&Row<E>> {
        self.rows.iter().find(|row| predicate(&row.entity))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn position(&self, key: &EntityKey) -> Option<usize> {
        self.rows.iter().position(|row| &row.key == key)
    }
}
