//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` so the server crate can prepare the
//! link document location and warm the cache in one call.

use std::path::Path;

use tracing::info;

use crate::cache::LinkCache;

/// Ensure the document directory exists.
pub async fn ensure_env(links_file: &Path) -> anyhow::Result<()> {
    common::env::ensure_env(links_file).await
}

/// Prepare the environment and run the cache's first load eagerly.
pub async fn prepare_cache(links_file: &Path, cache: &LinkCache) -> anyhow::Result<usize> {
    ensure_env(links_file).await?;
    info!("initializing link cache");
    let entries = cache.warm().await;
    info!(entries, "link cache initialized");
    Ok(entries)
}
