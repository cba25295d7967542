use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::errors::ServiceError;
use crate::keys::KeyFormat;
use crate::observability::{CACHE_RELOADS_TOTAL, CACHE_RELOAD_FAILURES_TOTAL, CACHE_SAVE_FAILURES_TOTAL};
use crate::storage::{ChangeMarker, JsonLinkDocument, LinkStore, LinkTable};

#[derive(Debug, Default)]
struct CacheState {
    table: LinkTable,
    marker: Option<ChangeMarker>,
    initialized: bool,
}

/// In-memory link table kept in step with its backing document.
///
/// Every read checks the document's [`ChangeMarker`] and reloads the whole
/// table only when it moved. Reads, reloads and writes all run under one
/// async mutex, so a reload can never interleave with a half-finished write.
///
/// Cloning is cheap and shares the same table. Two `LinkCache`s opened on the
/// same file in one process do not coordinate with each other.
#[derive(Clone)]
pub struct LinkCache {
    store: Arc<dyn LinkStore>,
    state: Arc<Mutex<CacheState>>,
    key_format: KeyFormat,
}

impl LinkCache {
    /// Cache over a JSON document at `path`. Nothing is read until first use.
    pub fn open<P: Into<PathBuf>>(path: P, key_format: KeyFormat) -> Self {
        Self::with_store(Arc::new(JsonLinkDocument::new(path)), key_format)
    }

    pub fn with_store(store: Arc<dyn LinkStore>, key_format: KeyFormat) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(CacheState::default())),
            key_format,
        }
    }

    pub fn key_format(&self) -> KeyFormat {
        self.key_format
    }

    /// Snapshot of the whole table, reloading first if the document changed.
    pub async fn get_all(&self) -> LinkTable {
        let mut state = self.state.lock().await;
        refresh_if_stale(self.store.as_ref(), &mut state).await;
        state.table.clone()
    }

    /// URL stored for `key`, subject to the same staleness check as [`get_all`](Self::get_all).
    pub async fn get(&self, key: &str) -> Option<String> {
        let key = self.key_format.normalize(key).ok()?;
        let mut state = self.state.lock().await;
        refresh_if_stale(self.store.as_ref(), &mut state).await;
        state.table.get(&key).cloned()
    }

    /// Insert or replace one entry and persist the whole table.
    ///
    /// The entry is only kept in memory if the document was written. The
    /// write runs on its own task so dropping the returned future cannot
    /// stop it between the in-memory update and the save.
    pub async fn put(&self, key: &str, url: &str) -> Result<(), ServiceError> {
        let key = self.key_format.normalize(key)?;
        let url = url.trim();
        if url.is_empty() {
            return Err(ServiceError::Validation("url must not be empty".into()));
        }
        let url = url.to_string();

        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            let mut state = state.lock().await;
            put_locked(store.as_ref(), &mut state, key, url).await
        });
        task.await
            .map_err(|e| ServiceError::Internal(format!("link write task failed: {e}")))?
    }

    /// Entries currently held in memory. Does not touch the document.
    pub async fn len(&self) -> usize {
        self.state.lock().await.table.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Run the initial load now instead of on the first request.
    pub async fn warm(&self) -> usize {
        self.get_all().await.len()
    }
}

async fn refresh_if_stale(store: &dyn LinkStore, state: &mut CacheState) {
    let current = match store.change_marker().await {
        Ok(marker) => marker,
        Err(e) if state.initialized => {
            warn!(error = %e, "cannot stat link document; serving cached table");
            return;
        }
        Err(e) => {
            warn!(error = %e, "cannot stat link document before first load");
            None
        }
    };
    if state.initialized && current == state.marker {
        return;
    }

    // The marker is taken before the read: if the document moves in between,
    // the next call sees a newer marker and reloads again.
    match store.load().await {
        Ok(table) => {
            info!(entries = table.len(), "link cache refreshed");
            state.table = table;
            state.marker = current;
            state.initialized = true;
            CACHE_RELOADS_TOTAL.inc();
        }
        Err(e) => {
            CACHE_RELOAD_FAILURES_TOTAL.inc();
            let corrupt = e.is_corrupt();
            if state.initialized {
                warn!(error = %e, corrupt, entries = state.table.len(), "link document reload failed; keeping last good table");
            } else {
                warn!(error = %e, corrupt, "initial link document load failed; starting with an empty table");
                state.initialized = true;
            }
        }
    }
}

async fn put_locked(
    store: &dyn LinkStore,
    state: &mut CacheState,
    key: String,
    url: String,
) -> Result<(), ServiceError> {
    // Pick up out-of-process edits so the save below does not overwrite them.
    refresh_if_stale(store, state).await;

    let previous = state.table.insert(key.clone(), url);
    if let Err(e) = store.save(&state.table).await {
        match previous {
            Some(prev) => {
                state.table.insert(key.clone(), prev);
            }
            None => {
                state.table.remove(&key);
            }
        }
        CACHE_SAVE_FAILURES_TOTAL.inc();
        error!(%key, error = %e, "failed to save link document; write rolled back");
        return Err(e.into());
    }

    // Re-stat rather than trusting the write: a concurrent external write
    // landing between the rename and this stat is absorbed unnoticed.
    state.marker = match store.change_marker().await {
        Ok(marker) => marker,
        Err(e) => {
            debug!(error = %e, "cannot stat link document after save; forcing reload on next read");
            None
        }
    };
    state.initialized = true;
    info!(%key, updated = previous.is_some(), "link saved");
    Ok(())
}
