//! The mirror index
//!
//! Wraps an upstream simple index with a transactional cache that is
//! shared between a master and its replicas.

mod cache;
mod factory;
mod stage;

pub use cache::{CacheEntry, ProjectLinks, UpdatedAt};
pub use factory::{create_stage, create_stage_with};
pub use stage::{MirrorStage, StageSettings, VersionData, VersionLink};
