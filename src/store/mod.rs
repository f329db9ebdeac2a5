//! Transaction store interface
//!
//! The mirror keeps its cache entries in a transactional key-value store
//! with a single writer and many readers. Every commit that changes data
//! advances a monotonically increasing transaction serial, which replicas
//! use to wait for writes performed on the master.

mod memory;

pub use memory::MemoryStore;

use crate::error::MirrorResult;
use crate::name::ProjectName;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Keys used by the mirror
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Cached simple links of a project
    ProjectLinks(ProjectName),
    /// Metadata of a resolved release file
    FileEntry(String),
    /// Event marking the initial serial listing as loaded
    SerialsLoaded,
}

impl StoreKey {
    /// Key for the cached links of `project`
    pub fn links(project: &ProjectName) -> Self {
        Self::ProjectLinks(project.clone())
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectLinks(project) => write!(f, "mirror/links/{}", project),
            Self::FileEntry(key) => write!(f, "mirror/files/{}", key),
            Self::SerialsLoaded => f.write_str("mirror/serials-loaded"),
        }
    }
}

/// Result of setting a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The stored value already equals the new one
    Unchanged,
    /// The value was staged for commit
    Applied,
    /// A change is needed but the transaction is read-only
    ReadOnlyViolation,
}

/// A read or write transaction
///
/// Dropping a transaction without committing discards staged writes.
pub trait Transaction: Send {
    /// Whether this transaction may write
    fn is_write(&self) -> bool;

    /// Store serial this transaction started at
    fn at_serial(&self) -> u64;

    /// Read a value, seeing this transaction's own staged writes
    fn get(&self, key: &StoreKey) -> Option<Value>;

    /// Stage a value
    ///
    /// Setting a value equal to the stored one is `Unchanged` in any
    /// transaction; any other set in a read transaction is a
    /// `ReadOnlyViolation`.
    fn set(&mut self, key: &StoreKey, value: Value) -> WriteOutcome;

    /// Commit, returning the store serial afterwards
    fn commit(self: Box<Self>) -> MirrorResult<u64>;
}

/// A store handing out transactions
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Begin a transaction; write transactions are exclusive
    async fn begin(&self, write: bool) -> MirrorResult<Box<dyn Transaction>>;

    /// Serial of the last commit that changed data
    fn current_serial(&self) -> u64;

    /// Wait until the store has reached `serial`
    ///
    /// There is no built-in timeout: this blocks for as long as the
    /// replication stream does not advance.
    async fn wait_for_serial(&self, serial: u64) -> MirrorResult<()>;

    /// Commit a read transaction and continue in a write transaction
    async fn restart_as_write(
        &self,
        tx: Box<dyn Transaction>,
    ) -> MirrorResult<Box<dyn Transaction>> {
        if tx.is_write() {
            return Ok(tx);
        }
        tx.commit()?;
        self.begin(true).await
    }
}
