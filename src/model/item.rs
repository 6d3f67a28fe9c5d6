use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::model::schema::{FieldSpec, Schema, SelectorSource, SelectorSpec};
use crate::model::value::{FieldKind, FieldValue};
use crate::model::{Entity, ResourceKind};
use crate::view::QuickFilter;

pub const CATEGORY_NAMES: &[&str] = &["Production", "Office", "Car Wash", "Paint/Damage"];

static FIELDS: &[FieldSpec] = &[
    FieldSpec::column("id", "ID", FieldKind::Number, 5).read_only(),
    FieldSpec::column("name", "Name", FieldKind::Text, 24),
    FieldSpec::column("sku", "SKU", FieldKind::Text, 12),
    FieldSpec::column("barcode", "Barcode", FieldKind::Text, 16),
    FieldSpec::column("category", "Category", FieldKind::Text, 13).with_choices(CATEGORY_NAMES),
    FieldSpec::column("quantity", "Qty", FieldKind::Number, 6),
    FieldSpec::column("threshold", "Min", FieldKind::Number, 6),
    FieldSpec::column("children", "Parts", FieldKind::Number, 5).read_only(),
    FieldSpec::column("threshold_breached", "Breached", FieldKind::Bool, 8)
        .read_only()
        .hidden(),
    FieldSpec::column("parent", "Parent", FieldKind::Number, 6)
        .read_only()
        .hidden(),
];

static SCHEMA: Schema = Schema {
    fields: FIELDS,
    searchable: &["name", "sku", "barcode"],
    selectors: &[SelectorSpec {
        field: "category",
        label: "Category",
        source: SelectorSource::Fixed(CATEGORY_NAMES),
    }],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumIter, EnumString)]
pub enum Category {
    #[serde(rename = "Production")]
    #[strum(serialize = "Production")]
    Production,
    #[serde(rename = "Office")]
    #[strum(serialize = "Office")]
    Office,
    #[serde(rename = "Car Wash")]
    #[strum(serialize = "Car Wash")]
    CarWash,
    #[serde(rename = "Paint/Damage")]
    #[strum(serialize = "Paint/Damage")]
    PaintDamage,
}

impl Default for Category {
    fn default() -> Self {
        Category::Production
    }
}

impl Category {
    pub fn all() -> Vec<Category> {
        Category::iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub threshold: i64,
    #[serde(default)]
    pub barcode: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub threshold_breached: bool,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub children: Vec<InventoryItem>,
}

impl InventoryItem {
    pub fn is_low_stock(&self) -> bool {
        self.quantity < self.threshold
    }
}

impl Entity for InventoryItem {
    const KIND: ResourceKind = ResourceKind::Inventory;

    fn schema() -> &'static Schema {
        &SCHEMA
    }

    fn server_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => FieldValue::Number(self.id),
            "name" => FieldValue::text(&self.name),
            "sku" => FieldValue::text(&self.sku),
            "barcode" => FieldValue::text(&self.barcode),
            "category" => FieldValue::text(&self.category),
            "quantity" => FieldValue::Number(self.quantity),
            "threshold" => FieldValue::Number(self.threshold),
            "children" => FieldValue::Number(self.children.len() as i64),
            "threshold_breached" => FieldValue::Bool(self.threshold_breached),
            "parent" => self.parent.map(FieldValue::Number).unwrap_or(FieldValue::Null),
            _ => FieldValue::Null,
        }
    }

    fn title(&self) -> String {
        self.name.clone()
    }

    fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    fn nested(&self) -> Vec<Self> {
        self.children.clone()
    }

    fn quick_filter(&self, filter: QuickFilter) -> bool {
        match filter {
            QuickFilter::All => true,
            QuickFilter::LowStock => self.is_low_stock(),
            QuickFilter::EmptyStock => self.quantity == 0,
            QuickFilter::WithChildren => !self.children.is_empty(),
        }
    }
}

/// The dashboard counters shown above the inventory table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryStats {
    pub total: usize,
    pub low_stock: usize,
    pub with_children: usize,
    pub empty_stock: usize,
}

impl InventoryStats {
    pub fn collect<'a>(items: impl IntoIterator<Item = &'a InventoryItem>) -> Self {
        items.into_iter().fold(Self::default(), |mut stats, item| {
            stats.total += 1;
            if item.is_low_stock() {
                stats.low_stock += 1;
            }
            if !item.children.is_empty() {
                stats.with_children += 1;
            }
            if item.quantity == 0 {
                stats.empty_stock += 1;
            }
            stats
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChildPartDraft {
    pub name: String,
    pub sku: String,
    pub barcode: String,
    pub quantity: i64,
    pub threshold: i64,
}

impl ChildPartDraft {
    pub fn numbered(index: usize) -> Self {
        Self {
            name: format!("Part {}", index + 1),
            sku: String::new(),
            barcode: String::new(),
            quantity: 0,
            threshold: 0,
        }
    }
}

/// Body for `POST /api/inventory/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDraft {
    pub name: String,
    pub sku: String,
    pub barcode: String,
    pub quantity: i64,
    pub threshold: i64,
    pub category: Category,
    #[serde(rename = "childParts")]
    pub child_parts: Vec<ChildPartDraft>,
}

impl Default for ItemDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            sku: String::new(),
            barcode: String::new(),
            quantity: 0,
            threshold: 0,
            category: Category::default(),
            child_parts: Vec::new(),
        }
    }
}

impl ItemDraft {
    /// Fills empty barcodes from the current clock and checks required fields.
    pub fn finalize(mut self) -> Result<Self> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("item name is required"));
        }
        if self.sku.trim().is_empty() {
            return Err(Error::validation("item SKU is required"));
        }
        if self.quantity < 0 || self.threshold < 0 {
            return Err(Error::validation("quantity and threshold cannot be negative"));
        }
        let millis = now_millis();
        if self.barcode.trim().is_empty() {
            self.barcode = item_barcode(millis);
        }
        for (index, part) in self.child_parts.iter_mut().enumerate() {
            if part.name.trim().is_empty() {
                return Err(Error::validation(format!("child part {} needs a name", index + 1)));
            }
            if part.quantity < 0 || part.threshold < 0 {
                return Err(Error::validation(format!(
                    "child part '{}' has a negative quantity",
                    part.name
                )));
            }
            if part.barcode.trim().is_empty() {
                part.barcode = child_barcode(millis, index);
            }
        }
        Ok(self)
    }
}

pub fn item_barcode(millis: i128) -> String {
    format!("BAR{millis}")
}

pub fn child_barcode(millis: i128, index: usize) -> String {
    format!("PARTBAR-{millis}-{index}")
}

fn now_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

#[cfg(test)]
pub(crate) fn sample(id: i64, name: &str, quantity: i64, threshold: i64) -> InventoryItem {
    InventoryItem {
        id,
        name: name.to_string(),
        sku: format!("SKU-{id}"),
        quantity,
        threshold,
        barcode: format!("BC{id}"),
        category: "Production".to_string(),
        threshold_breached: quantity < threshold,
        parent: None,
        children: Vec::new(),
    }
}
