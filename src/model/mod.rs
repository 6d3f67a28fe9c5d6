//! Typed entities served by the StockOverflow API and the static field
//! schemas the rest of the crate uses to filter, sort, render and edit them.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use strum::{Display, EnumIter, EnumString};

pub mod car;
pub mod item;
pub mod log;
pub mod schema;
pub mod user;
pub mod value;

pub use car::{Car, CarDraft};
pub use item::{Category, ChildPartDraft, InventoryItem, InventoryStats, ItemDraft};
pub use log::LogEntry;
pub use schema::{FieldSpec, Schema, SelectorSource, SelectorSpec};
pub use user::{Role, User, UserDraft};
pub use value::{locale_cmp, FieldKind, FieldValue};

use crate::view::QuickFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ResourceKind {
    Inventory,
    Users,
    Cars,
    Logs,
}

impl ResourceKind {
    /// Singular noun for status messages.
    pub fn noun(self) -> &'static str {
        match self {
            ResourceKind::Inventory => "item",
            ResourceKind::Users => "user",
            ResourceKind::Cars => "car",
            ResourceKind::Logs => "log entry",
        }
    }
}

/// A row type mirrored from one API resource.
pub trait Entity: Clone + Debug + DeserializeOwned + Send + 'static {
    const KIND: ResourceKind;

    fn schema() -> &'static Schema;

    /// Server-assigned identifier, when the serializer exposes one.
    fn server_id(&self) -> Option<i64>;

    /// Current value of a schema field; unknown names yield `Null`.
    fn field(&self, name: &str) -> FieldValue;

    fn title(&self) -> String;

    /// Whether the row is listed at the top level of the table.
    fn is_top_level(&self) -> bool {
        true
    }

    /// Entities embedded in this one that are also tracked on their own.
    fn nested(&self) -> Vec<Self> {
        Vec::new()
    }

    fn quick_filter(&self, _filter: QuickFilter) -> bool {
        true
    }
}
