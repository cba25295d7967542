//! Invalidating in-memory view of the link document.

pub mod link_cache;

pub use link_cache::LinkCache;
