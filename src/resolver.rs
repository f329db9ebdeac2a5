//! Resolution of candidate links into locally addressable entries
//!
//! The artifact storage itself lives elsewhere; resolving a link only
//! records which key the release file will be served under.

use crate::error::MirrorResult;
use crate::links::{meta, Link};
use crate::store::{StoreKey, Transaction, WriteOutcome};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

/// Outcome of a step that may need a write transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persist<T> {
    /// The step completed in the current transaction
    Done(T),
    /// The step has to change data but the transaction is read-only
    NeedsWrite,
}

/// A link resolved to a storage key, as persisted in the project cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    /// Relative storage key the file is served under
    pub key: String,
    /// Upstream URL without fragment
    pub url: String,
    /// File name
    pub basename: String,
    /// `<algo>=<hex>` digest from the upstream link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_spec: Option<String>,
    /// Egg fragment of legacy egg links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egg: Option<String>,
}

impl ResolvedEntry {
    /// Build the entry for `link`
    ///
    /// Keys derive from the SHA-256 of the fragment-less URL, so the same
    /// upstream file always maps to the same key.
    pub fn for_link(link: &Link) -> Self {
        let url = link.url_nofrag();
        let digest = hex::encode(Sha256::digest(url.as_bytes()));
        let basename = link.basename();
        Self {
            key: format!("+f/{}/{}/{}", &digest[..3], &digest[3..16], basename),
            url,
            basename,
            hash_spec: link.hash_spec().map(str::to_string),
            egg: link.egg_fragment().map(str::to_string),
        }
    }

    /// Key plus digest fragment, as linked from a simple page
    pub fn href(&self) -> String {
        match &self.hash_spec {
            Some(hash) => format!("{}#{}", self.key, hash),
            None => self.key.clone(),
        }
    }

    /// The egg fragment, or the version parsed from the basename
    pub fn egg_or_version(&self) -> Option<String> {
        self.egg
            .clone()
            .or_else(|| meta::version_of(&self.basename))
    }
}

/// Maps candidate links to storage entries
///
/// Implementations must leave storage untouched when the entry already
/// exists, so resolution can be attempted in a read transaction.
pub trait ContentResolver: Send + Sync {
    /// Resolve `link` within `tx`
    fn resolve(&self, tx: &mut dyn Transaction, link: &Link) -> MirrorResult<Persist<ResolvedEntry>>;
}

/// Resolver recording a file entry per release link
#[derive(Debug, Default, Clone, Copy)]
pub struct FileEntryResolver;

impl ContentResolver for FileEntryResolver {
    fn resolve(&self, tx: &mut dyn Transaction, link: &Link) -> MirrorResult<Persist<ResolvedEntry>> {
        let entry = ResolvedEntry::for_link(link);
        let record = json!({
            "url": entry.url,
            "basename": entry.basename,
            "hash_spec": entry.hash_spec,
        });
        match tx.set(&StoreKey::FileEntry(entry.key.clone()), record) {
            WriteOutcome::ReadOnlyViolation => Ok(Persist::NeedsWrite),
            WriteOutcome::Unchanged | WriteOutcome::Applied => Ok(Persist::Done(entry)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, TransactionStore};

    fn link() -> Link {
        Link::parse("https://files.example/py-1.0.tar.gz#sha256=abcd").unwrap()
    }

    #[test]
    fn entry_key_is_stable_and_fragment_free() {
        let a = ResolvedEntry::for_link(&link());
        let b = ResolvedEntry::for_link(
            &Link::parse("https://files.example/py-1.0.tar.gz#md5=ff").unwrap(),
        );
        assert_eq!(a.key, b.key);
        assert!(a.key.starts_with("+f/"));
        assert!(a.key.ends_with("/py-1.0.tar.gz"));
        assert_eq!(a.href(), format!("{}#sha256=abcd", a.key));
        assert_eq!(a.egg_or_version().as_deref(), Some("1.0"));
    }

    #[test]
    fn egg_entries_report_their_fragment() {
        let entry =
            ResolvedEntry::for_link(&Link::parse("http://a.example/py/trunk#egg=py-dev").unwrap());
        assert_eq!(entry.egg_or_version().as_deref(), Some("py-dev"));
    }

    #[tokio::test]
    async fn resolving_known_entries_needs_no_write() {
        let store = MemoryStore::new();
        let resolver = FileEntryResolver;

        let mut tx = store.begin(false).await.unwrap();
        assert_eq!(resolver.resolve(tx.as_mut(), &link()).unwrap(), Persist::NeedsWrite);

        let mut tx = store.restart_as_write(tx).await.unwrap();
        let entry = match resolver.resolve(tx.as_mut(), &link()).unwrap() {
            Persist::Done(entry) => entry,
            Persist::NeedsWrite => panic!("write transaction refused"),
        };
        tx.commit().unwrap();

        let mut tx = store.begin(false).await.unwrap();
        assert_eq!(
            resolver.resolve(tx.as_mut(), &link()).unwrap(),
            Persist::Done(entry)
        );
    }
}
