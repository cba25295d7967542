use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::errors::StoreError;
use crate::storage::link_store::{ChangeMarker, LinkStore, LinkTable};

/// JSON file holding the whole link table.
///
/// Writes go to a sibling `.tmp` file which is then renamed over the document,
/// so readers see either the old or the new content, never a torn write.
/// There is no file locking: two processes writing the same document race.
#[derive(Debug, Clone)]
pub struct JsonLinkDocument {
    file_path: PathBuf,
}

impl JsonLinkDocument {
    /// No I/O happens here; the document is created by the first `save`.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { file_path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.file_path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl LinkStore for JsonLinkDocument {
    async fn change_marker(&self) -> Result<Option<ChangeMarker>, StoreError> {
        match fs::metadata(&self.file_path).await {
            Ok(meta) => Ok(Some(ChangeMarker::from_metadata(&meta))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&self.file_path, e)),
        }
    }

    async fn load(&self) -> Result<LinkTable, StoreError> {
        let content = match fs::read_to_string(&self.file_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LinkTable::new()),
            Err(e) => return Err(StoreError::io(&self.file_path, e)),
        };
        if content.trim().is_empty() {
            return Ok(LinkTable::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.file_path.clone(),
            source,
        })
    }

    async fn save(&self, table: &LinkTable) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        let data = serde_json::to_vec_pretty(table)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, &data)
            .await
            .map_err(|e| StoreError::io(&temp_path, e))?;
        if let Err(e) = fs::rename(&temp_path, &self.file_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::io(&self.file_path, e));
        }
        debug!(file = %self.file_path.display(), entries = table.len(), bytes = data.len(), "link document saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_doc() -> JsonLinkDocument {
        JsonLinkDocument::new(std::env::temp_dir().join(format!("links_{}.json", uuid::Uuid::new_v4())))
    }

    #[tokio::test]
    async fn absent_document_is_empty_and_has_no_marker() -> Result<(), anyhow::Error> {
        let doc = temp_doc();
        assert!(doc.change_marker().await?.is_none());
        assert!(doc.load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn blank_document_loads_empty() -> Result<(), anyhow::Error> {
        let doc = temp_doc();
        fs::write(doc.path(), "  \n\t").await?;
        assert!(doc.load().await?.is_empty());
        assert!(doc.change_marker().await?.is_some());
        let _ = fs::remove_file(doc.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn truncated_document_is_corrupt() -> Result<(), anyhow::Error> {
        let doc = temp_doc();
        fs::write(doc.path(), r#"{"0001": "https://x/1""#).await?;
        let err = doc.load().await.unwrap_err();
        assert!(err.is_corrupt(), "unexpected error: {err}");
        let _ = fs::remove_file(doc.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn save_then_load_persists_and_moves_marker() -> Result<(), anyhow::Error> {
        let doc = temp_doc();
        let mut table = LinkTable::new();
        table.insert("0002".into(), "https://x/2".into());
        table.insert("0001".into(), "https://x/1".into());
        doc.save(&table).await?;
        let first = doc.change_marker().await?;
        assert!(first.is_some());

        assert_eq!(doc.load().await?, table);
        let raw = fs::read_to_string(doc.path()).await?;
        assert!(raw.find("0001").unwrap() < raw.find("0002").unwrap(), "keys are written sorted");
        assert!(fs::metadata(doc.temp_path()).await.is_err(), "temp file is renamed away");

        table.insert("0003".into(), "https://x/3".into());
        doc.save(&table).await?;
        assert_ne!(doc.change_marker().await?, first);

        let _ = fs::remove_file(doc.path()).await;
        Ok(())
    }

    #[tokio::test]
    async fn save_creates_parent_directory() -> Result<(), anyhow::Error> {
        let dir = std::env::temp_dir().join(format!("links_dir_{}", uuid::Uuid::new_v4()));
        let doc = JsonLinkDocument::new(dir.join("data").join("links.json"));
        doc.save(&LinkTable::new()).await?;
        assert_eq!(fs::read_to_string(doc.path()).await?, "{}");
        let _ = fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn save_into_unwritable_location_surfaces_io_error() {
        let blocker = std::env::temp_dir().join(format!("links_blocker_{}", uuid::Uuid::new_v4()));
        fs::write(&blocker, "not a directory").await.unwrap();
        let doc = JsonLinkDocument::new(blocker.join("links.json"));
        let err = doc.save(&LinkTable::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        let _ = fs::remove_file(&blocker).await;
    }
}
