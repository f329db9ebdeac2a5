//! Persisted project pages and their refresh timestamps

use crate::error::MirrorResult;
use crate::name::ProjectName;
use crate::resolver::ResolvedEntry;
use crate::store::{StoreKey, Transaction, WriteOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Links of a project as served to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectLinks {
    /// The project exists upstream; its release entries, newest first
    Present(Vec<ResolvedEntry>),
    /// Upstream confirmed the project does not exist
    Absent,
}

impl ProjectLinks {
    /// Entries, empty for an absent project
    pub fn entries(&self) -> &[ResolvedEntry] {
        match self {
            ProjectLinks::Present(entries) => entries,
            ProjectLinks::Absent => &[],
        }
    }

    /// Whether this is the non-existence marker
    pub fn is_absent(&self) -> bool {
        matches!(self, ProjectLinks::Absent)
    }
}

/// A project page as persisted in the transaction store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Upstream serial the page was fetched at
    pub serial: i64,
    /// `None` marks a project upstream reported as missing
    pub entries: Option<Vec<ResolvedEntry>>,
}

impl CacheEntry {
    /// Entry for an existing project
    pub fn present(serial: i64, entries: Vec<ResolvedEntry>) -> Self {
        Self {
            serial,
            entries: Some(entries),
        }
    }

    /// Non-existence marker
    pub fn absent(serial: i64) -> Self {
        Self {
            serial,
            entries: None,
        }
    }

    /// Convert into what callers see
    pub fn into_links(self) -> ProjectLinks {
        match self.entries {
            Some(entries) => ProjectLinks::Present(entries),
            None => ProjectLinks::Absent,
        }
    }

    /// Load the entry of `project`
    ///
    /// A cleared entry (`{}`) reads as never looked up.
    pub fn load(tx: &dyn Transaction, project: &ProjectName) -> MirrorResult<Option<Self>> {
        match tx.get(&StoreKey::links(project)) {
            None => Ok(None),
            Some(Value::Object(map)) if map.is_empty() => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Store this entry for `project`
    pub fn dump(&self, tx: &mut dyn Transaction, project: &ProjectName) -> MirrorResult<WriteOutcome> {
        let value = serde_json::to_value(self)?;
        Ok(tx.set(&StoreKey::links(project), value))
    }

    /// Store the cleared marker for `project`
    ///
    /// The key is kept rather than removed so replicas see the clearing.
    pub fn clear(tx: &mut dyn Transaction, project: &ProjectName) -> WriteOutcome {
        tx.set(
            &StoreKey::links(project),
            Value::Object(serde_json::Map::new()),
        )
    }
}

/// When each project page was last confirmed against upstream
///
/// Kept in memory only; a restart makes every cached page stale.
#[derive(Debug, Default)]
pub struct UpdatedAt {
    stamps: RwLock<HashMap<ProjectName, DateTime<Utc>>>,
}

impl UpdatedAt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `project` as refreshed now
    pub fn touch(&self, project: &ProjectName) {
        self.set(project, Utc::now());
    }

    pub fn set(&self, project: &ProjectName, at: DateTime<Utc>) {
        self.stamps
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(project.clone(), at);
    }

    pub fn get(&self, project: &ProjectName) -> Option<DateTime<Utc>> {
        self.stamps
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(project)
            .copied()
    }

    /// Whether `project` was refreshed within `expiry`
    pub fn is_recent(&self, project: &ProjectName, expiry: Duration) -> bool {
        let Some(at) = self.get(project) else {
            return false;
        };
        // a stamp from the future has negative age and counts as recent
        Utc::now()
            .signed_duration_since(at)
            .to_std()
            .map_or(true, |age| age <= expiry)
    }
}
