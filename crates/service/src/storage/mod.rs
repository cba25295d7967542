//! Storage abstractions for the link table
//!
//! The table lives in one JSON document; [`LinkStore`] is the seam the cache
//! talks to so tests can swap the filesystem for an in-memory double.

pub mod link_store;
pub mod json_link_document;

pub use json_link_document::JsonLinkDocument;
pub use link_store::{ChangeMarker, LinkStore, LinkTable};
