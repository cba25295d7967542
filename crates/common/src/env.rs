//! Environment/runtime helpers
//!
//! Sanity checks to ensure the link document can be written at startup.

use std::path::Path;

use tracing::{info, warn};

/// Ensure the directory holding the link document exists.
///
/// The document itself is created lazily on the first successful write, so a
/// missing file only produces an informational log line.
pub async fn ensure_env(links_file: &Path) -> anyhow::Result<()> {
    if let Some(dir) = links_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", dir.display()))?;
    }
    match tokio::fs::metadata(links_file).await {
        Ok(meta) if meta.is_dir() => {
            return Err(anyhow::anyhow!("{} is a directory, expected a JSON document", links_file.display()));
        }
        Ok(_) => {}
        Err(_) => {
            info!(file = %links_file.display(), "link document not found; it will be created on first write");
        }
    }
    if links_file.extension().and_then(|e| e.to_str()) != Some("json") {
        warn!(file = %links_file.display(), "link document does not use a .json extension");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_parent_directory() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("postlink_env_{}", uuid::Uuid::new_v4()));
        let file = dir.join("nested").join("links.json");
        ensure_env(&file).await?;
        assert!(tokio::fs::metadata(dir.join("nested")).await?.is_dir());
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }

    #[tokio::test]
    async fn rejects_directory_in_place_of_document() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("postlink_env_{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(dir.join("links.json")).await?;
        assert!(ensure_env(&dir.join("links.json")).await.is_err());
        let _ = tokio::fs::remove_dir_all(&dir).await;
        Ok(())
    }
}
