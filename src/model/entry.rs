use indexmap::IndexMap;
use serde::Serialize;

use super::decl::PersistenceMode;
use super::member::MarkedMember;

/// One registered identifier with the members that produce and consume its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub id: String,
    pub getter: Option<MarkedMember>,
    pub setter: Option<MarkedMember>,
    pub mode: PersistenceMode,
}

impl Entry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            getter: None,
            setter: None,
            mode: PersistenceMode::Default,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.getter.is_none() && self.setter.is_none()
    }
}

/// Entries of one type, in first-insertion order of their ids.
pub type EntryTable = IndexMap<String, Entry>;
