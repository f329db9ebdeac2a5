//! Serial table: the latest upstream serial known per project
//!
//! Loaded from a JSON snapshot at startup, or seeded once from the
//! upstream's full listing. Serials only ever move forward.

use crate::config::NodeRole;
use crate::error::{MirrorError, MirrorResult};
use crate::name::ProjectName;
use crate::store::{StoreKey, TransactionStore};
use crate::upstream::SimpleIndexProxy;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::fs;
use tracing::{debug, info};

/// How the table got its initial contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// A snapshot on disk was reused
    Reused,
    /// The listing was fetched from upstream and snapshotted
    Fetched,
}

/// Process-wide map from project to highest observed serial
pub struct SerialTable {
    path: PathBuf,
    serials: RwLock<HashMap<ProjectName, i64>>,
}

impl SerialTable {
    /// Create an empty table snapshotting to `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            serials: RwLock::new(HashMap::new()),
        }
    }

    /// Load the snapshot at `path`; a missing file yields an empty table
    pub async fn load(path: PathBuf) -> MirrorResult<Self> {
        let table = Self::new(path);
        if !table.path.exists() {
            debug!("No serial snapshot at {}", table.path.display());
            return Ok(table);
        }

        let content = fs::read_to_string(&table.path).await.map_err(|e| {
            MirrorError::io(format!("reading serial snapshot {}", table.path.display()), e)
        })?;
        let raw: HashMap<String, i64> = serde_json::from_str(&content)?;
        table.extend(raw.into_iter().map(|(name, serial)| (ProjectName::new(&name), serial)));
        Ok(table)
    }

    /// Snapshot file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serial of `project`, `-1` if unknown
    pub fn get(&self, project: &ProjectName) -> i64 {
        self.serials
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(project)
            .copied()
            .unwrap_or(-1)
    }

    /// Move the serial of `project` up to `observed`
    ///
    /// Comparison and update happen under one lock. An `observed` serial
    /// below the recorded one is an upstream regression and leaves the
    /// table unchanged.
    pub fn advance(&self, project: &ProjectName, observed: i64) -> MirrorResult<()> {
        let mut serials = self.serials.write().unwrap_or_else(|e| e.into_inner());
        let known = serials.get(project).copied().unwrap_or(-1);
        if observed < known {
            return Err(MirrorError::SerialRegression {
                project: project.to_string(),
                observed,
                known,
            });
        }
        if observed > known {
            serials.insert(project.clone(), observed);
        }
        Ok(())
    }

    /// Number of known projects
    pub fn len(&self) -> usize {
        self.serials.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether no project is known
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All known projects, sorted
    pub fn projects(&self) -> Vec<ProjectName> {
        let mut projects: Vec<ProjectName> = self
            .serials
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        projects.sort();
        projects
    }

    fn extend(&self, entries: impl IntoIterator<Item = (ProjectName, i64)>) {
        let mut serials = self.serials.write().unwrap_or_else(|e| e.into_inner());
        for (project, serial) in entries {
            let known = serials.entry(project).or_insert(serial);
            *known = (*known).max(serial);
        }
    }

    /// Write the snapshot file
    pub async fn save(&self) -> MirrorResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| MirrorError::io(format!("creating {}", parent.display()), e))?;
        }
        let snapshot: HashMap<String, i64> = self
            .serials
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(project, serial)| (project.to_string(), *serial))
            .collect();
        let content = serde_json::to_string(&snapshot)?;
        fs::write(&self.path, content).await.map_err(|e| {
            MirrorError::io(format!("writing serial snapshot {}", self.path.display()), e)
        })?;
        Ok(())
    }

    /// Seed the table from upstream unless it already has contents
    ///
    /// An unreachable upstream is fatal here: without a baseline the
    /// mirror cannot tell stale pages from fresh ones. On the master the
    /// initial load is recorded in the store for downstream consumers.
    pub async fn bootstrap_if_empty(
        &self,
        proxy: &SimpleIndexProxy,
        store: &dyn TransactionStore,
        role: NodeRole,
    ) -> MirrorResult<Bootstrap> {
        if !self.is_empty() {
            info!("reusing already cached name/serial list");
            return Ok(Bootstrap::Reused);
        }

        info!("retrieving initial name/serial list");
        let listing = proxy.list_packages_with_serial().await.ok_or_else(|| {
            MirrorError::MirrorInitFailed(format!("{} not reachable", proxy.simple_url()))
        })?;
        self.extend(listing);
        self.save().await?;

        if role == NodeRole::Master {
            let mut tx = store.begin(true).await?;
            tx.set(
                &StoreKey::SerialsLoaded,
                serde_json::json!({ "loaded_at": Utc::now().to_rfc3339(), "projects": self.len() }),
            );
            let serial = tx.commit()?;
            debug!("recorded serial listing load at store serial {}", serial);
        }
        Ok(Bootstrap::Fetched)
    }
}
