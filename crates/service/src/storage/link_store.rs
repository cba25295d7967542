use std::collections::BTreeMap;
use std::time::SystemTime;

use async_trait::async_trait;

use crate::errors::StoreError;

/// Post key -> URL. Sorted so the persisted document is stable.
pub type LinkTable = BTreeMap<String, String>;

/// Cheap revision signal for the backing document.
///
/// Modification time alone misses two writes landing in the same timestamp
/// tick, so the byte length is compared as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeMarker {
    pub modified: Option<SystemTime>,
    pub len: u64,
}

impl ChangeMarker {
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        Self { modified: meta.modified().ok(), len: meta.len() }
    }
}

/// Whole-document persistence for the link table.
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Current marker, or `None` when the document does not exist.
    async fn change_marker(&self) -> Result<Option<ChangeMarker>, StoreError>;
    /// Read the full table. Absent or blank documents load as empty.
    async fn load(&self) -> Result<LinkTable, StoreError>;
    /// Replace the document with `table`.
    async fn save(&self, table: &LinkTable) -> Result<(), StoreError>;
}
