//! simplemirror - caching mirror of a Python simple package index
//!
//! Fetches per-project simple pages from an upstream index, follows
//! `homepage`/`download` links one hop deep, and keeps the resulting
//! release links in a transactional store shared by a master node and its
//! replicas. Upstream serial numbers decide when a cached page is stale.

pub mod cli;
pub mod config;
pub mod error;
pub mod links;
pub mod mirror;
pub mod name;
pub mod resolver;
pub mod serials;
pub mod store;
pub mod upstream;

pub use error::{MirrorError, MirrorResult};
