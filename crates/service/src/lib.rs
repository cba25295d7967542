//! Link lookup service layer.
//! - `storage`: the JSON document holding post key -> URL.
//! - `cache`: in-memory table reloaded only when the document changes.
//! - `commands`: chat command parsing and replies on top of the cache.
//! - `metrics`/`observability`: request counters, latency window, prometheus.

pub mod errors;
pub mod keys;
pub mod storage;
pub mod cache;
pub mod metrics;
pub mod observability;
pub mod commands;
pub mod runtime;

pub use cache::LinkCache;
pub use commands::{Command, CommandService};
pub use errors::{ServiceError, StoreError};
pub use keys::KeyFormat;
pub use metrics::{MetricsSnapshot, RequestMetrics};
