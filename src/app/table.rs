//! Type-erased access to a [`ResourceView`] so the key handlers and the
//! renderer can work on whichever tab is active.

use bitflags::bitflags;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::error::{Error, Result};
use crate::model::{Entity, FieldSpec, FieldValue, ResourceKind, Schema};
use crate::store::{EntityKey, ResourceView, RowPhase};
use crate::view::{selector_options, FilterState, QuickFilter};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RowMarks: u8 {
        const DIRTY = 1;
        const SAVING = 1 << 1;
        const DELETING = 1 << 2;
        const FAILED = 1 << 3;
        const LOW_STOCK = 1 << 4;
        const EMPTY = 1 << 5;
    }
}

impl RowMarks {
    pub fn is_busy(self) -> bool {
        self.intersects(RowMarks::SAVING | RowMarks::DELETING)
    }

    /// Single-column gutter marker.
    pub fn glyph(self) -> &'static str {
        if self.contains(RowMarks::DELETING) {
            "x"
        } else if self.contains(RowMarks::SAVING) {
            "~"
        } else if self.contains(RowMarks::FAILED) {
            "!"
        } else if self.contains(RowMarks::DIRTY) {
            "*"
        } else {
            " "
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub key: EntityKey,
    pub title: String,
    pub cells: Vec<String>,
    pub marks: RowMarks,
    pub error: Option<String>,
}

/// The current page rendered to strings.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    pub columns: Vec<&'static FieldSpec>,
    pub rows: Vec<TableRow>,
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
    pub loaded: usize,
    pub dirty: usize,
}

pub trait TableModel {
    fn kind(&self) -> ResourceKind;
    fn schema(&self) -> &'static Schema;
    fn filter(&self) -> &FilterState;
    fn filter_mut(&mut self) -> &mut FilterState;
    fn snapshot(&self) -> TableSnapshot;
    fn page_keys(&self) -> Vec<EntityKey>;
    fn selector_options(&self, field: &str) -> Vec<String>;
    /// Text to pre-fill an edit prompt with.
    fn edit_text(&self, key: &EntityKey, field: &str) -> Option<String>;
    fn edit(&mut self, key: EntityKey, field: &str, raw: &str) -> Result<()>;
    fn discard(&mut self, key: &EntityKey) -> Result<()>;
    fn title_of(&self, key: &EntityKey) -> Option<String>;
    fn phase_of(&self, key: &EntityKey) -> RowPhase;
    fn dirty_keys(&self) -> Vec<EntityKey>;
    fn is_loaded(&self) -> bool;
    fn take_error(&mut self) -> Option<Error>;
}

impl<E: Entity> TableModel for ResourceView<E> {
    fn kind(&self) -> ResourceKind {
        E::KIND
    }

    fn schema(&self) -> &'static Schema {
        E::schema()
    }

    fn filter(&self) -> &FilterState {
        &self.filter
    }

    fn filter_mut(&mut self) -> &mut FilterState {
        &mut self.filter
    }

    fn snapshot(&self) -> TableSnapshot {
        let columns: Vec<&'static FieldSpec> = E::schema().columns().collect();
        let page = self.view();
        let rows = page
            .rows
            .iter()
            .map(|row| {
                let cells = columns
                    .iter()
                    .map(|spec| cell_text(spec, &self.display_value(row, spec.name)))
                    .collect();
                let mut marks = RowMarks::empty();
                if self.is_dirty(&row.key) {
                    marks |= RowMarks::DIRTY;
                }
                match self.phase(&row.key) {
                    RowPhase::Saving => marks |= RowMarks::SAVING,
                    RowPhase::Deleting => marks |= RowMarks::DELETING,
                    RowPhase::Idle | RowPhase::Editing => {}
                }
                let error = self.row_error(&row.key).map(Error::summary);
                if error.is_some() {
                    marks |= RowMarks::FAILED;
                }
                if E::KIND == ResourceKind::Inventory {
                    if row.entity.quick_filter(QuickFilter::EmptyStock) {
                        marks |= RowMarks::EMPTY;
                    } else if row.entity.quick_filter(QuickFilter::LowStock) {
                        marks |= RowMarks::LOW_STOCK;
                    }
                }
                TableRow {
                    key: row.key,
                    title: row.entity.title(),
                    cells,
                    marks,
                    error,
                }
            })
            .collect();
        TableSnapshot {
            columns,
            rows,
            page: page.page,
            page_count: page.page_count,
            total: page.total,
            loaded: self.collection().len(),
            dirty: self.buffer().len(),
        }
    }

    fn page_keys(&self) -> Vec<EntityKey> {
        self.view().rows.iter().map(|row| row.key).collect()
    }

    fn selector_options(&self, field: &str) -> Vec<String> {
        E::schema()
            .selector(field)
            .map(|spec| selector_options(self.collection(), spec))
            .unwrap_or_default()
    }

    fn edit_text(&self, key: &EntityKey, field: &str) -> Option<String> {
        let row = self.collection().iter().find(|row| row.key == *key)?;
        let spec = E::schema().field(field)?;
        if spec.secret {
            return Some(String::new());
        }
        Some(match self.display_value(row, field) {
            FieldValue::Bool(flag) => flag.to_string(),
            other => other.to_string(),
        })
    }

    fn edit(&mut self, key: EntityKey, field: &str, raw: &str) -> Result<()> {
        ResourceView::edit(self, key, field, raw)
    }

    fn discard(&mut self, key: &EntityKey) -> Result<()> {
        ResourceView::discard(self, key)
    }

    fn title_of(&self, key: &EntityKey) -> Option<String> {
        self.collection().get(key).map(Entity::title)
    }

    fn phase_of(&self, key: &EntityKey) -> RowPhase {
        self.phase(key)
    }

    fn dirty_keys(&self) -> Vec<EntityKey> {
        self.buffer().dirty_keys()
    }

    fn is_loaded(&self) -> bool {
        ResourceView::is_loaded(self)
    }

    fn take_error(&mut self) -> Option<Error> {
        ResourceView::take_error(self)
    }
}

/// Cell text for a value; secrets never show their content.
pub fn cell_text(spec: &FieldSpec, value: &FieldValue) -> String {
    if spec.secret {
        return match value {
            FieldValue::Text(text) if !text.is_empty() => "*".repeat(6),
            _ => String::new(),
        };
    }
    value.to_string()
}

/// Cuts `text` to at most `width` terminal columns, marking the cut with `…`.
pub fn truncate(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::item::sample;
    use crate::model::{user, InventoryItem, User};

    #[test]
    fn snapshot_overlays_buffer_and_marks_rows() {
        let mut view: ResourceView<InventoryItem> = ResourceView::new(10);
        view.load(vec![sample(1, "Bolt", 5, 10), sample(2, "Nut", 0, 1), sample(3, "Cam", 9, 1)]);
        view.edit(EntityKey::Server(3), "quantity", "12").unwrap();

        let table: &dyn TableModel = &view;
        let snapshot = table.snapshot();
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.dirty, 1);
        let qty = snapshot
            .columns
            .iter()
            .position(|spec| spec.name == "quantity")
            .unwrap();

        let marks: Vec<RowMarks> = snapshot.rows.iter().map(|row| row.marks).collect();
        assert_eq!(marks, vec![RowMarks::LOW_STOCK, RowMarks::EMPTY, RowMarks::DIRTY]);
        assert_eq!(snapshot.rows[2].cells[qty], "12");
        assert_eq!(snapshot.rows[2].marks.glyph(), "*");
    }

    #[test]
    fn password_edits_are_masked() {
        let mut view: ResourceView<User> = ResourceView::new(10);
        view.load(vec![user::sample(1, "ana", "worker", true)]);
        let key = EntityKey::Server(1);
        view.edit(key, "password", "hunter2").unwrap();

        let snapshot = view.snapshot();
        let column = snapshot
            .columns
            .iter()
            .position(|spec| spec.name == "password")
            .unwrap();
        assert_eq!(snapshot.rows[0].cells[column], "******");
        assert_eq!(view.edit_text(&key, "password").as_deref(), Some(""));
        assert_eq!(view.edit_text(&key, "is_active").as_deref(), Some("true"));
    }

    #[test]
    fn truncate_respects_display_width() {
        assert_eq!(truncate("Bolt", 10), "Bolt");
        assert_eq!(truncate("Hex Bolt M8", 6), "Hex B…");
        assert_eq!(truncate("部品番号", 5), "部品…");
        assert_eq!(truncate("abc", 0), "");
    }
}
