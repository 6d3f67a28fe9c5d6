//! Client-side mirror of server state: the collection, pending edits and the
//! per-row reconciliation state machine.

use std::fmt;

use uuid::Uuid;

pub mod buffer;
pub mod collection;
pub mod reconcile;

pub use buffer::{EditBuffer, Patch};
pub use collection::{Collection, Row};
pub use reconcile::{ResourceView, RowPhase, RowState, SaveRequest};

/// Stable identity of a row. Server ids are preferred; rows the server
/// does not identify get a surrogate for as long as they are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Server(i64),
    Local(Uuid),
}

impl EntityKey {
    pub fn local() -> Self {
        EntityKey::Local(Uuid::new_v4())
    }

    pub fn server_id(&self) -> Option<i64> {
        match self {
            EntityKey::Server(id) => Some(*id),
            EntityKey::Local(_) => None,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Server(id) => write!(f, "#{id}"),
            EntityKey::Local(uuid) => {
                let simple = uuid.simple().to_string();
                write!(f, "local:{}", &simple[..8])
            }
        }
    }
}
