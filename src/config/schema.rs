//! Configuration schema for simplemirror
//!
//! Configuration is stored at `~/.config/simplemirror/config.toml`

use crate::error::{MirrorError, MirrorResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default upstream simple index
pub const DEFAULT_SIMPLE_URL: &str = "https://pypi.org/simple/";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Mirror behaviour
    pub mirror: MirrorConfig,

    /// Local state
    pub storage: StorageConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Role of this node in a master/replica deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Writes to the transaction store directly
    #[default]
    Master,
    /// Receives the master's writes through replication
    Replica,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Master => f.write_str("master"),
            NodeRole::Replica => f.write_str("replica"),
        }
    }
}

/// Mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Node role
    pub role: NodeRole,

    /// Upstream simple index (master only)
    pub simple_url: String,

    /// Master server URL (replica only)
    pub master_url: Option<String>,

    /// Seconds a cached project page stays fresh
    pub cache_expiry_secs: u64,

    /// Timeout for a single upstream request
    pub request_timeout_secs: u64,

    /// Bound on a replica's wait for replicated writes (unset = wait forever)
    pub replica_wait_timeout_secs: Option<u64>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            role: NodeRole::Master,
            simple_url: DEFAULT_SIMPLE_URL.to_string(),
            master_url: None,
            cache_expiry_secs: 1800,
            request_timeout_secs: 30,
            replica_wait_timeout_secs: None,
        }
    }
}

impl MirrorConfig {
    /// The simple index this node fetches project pages from
    ///
    /// Replicas go through the master's mirror index, masters straight to
    /// the upstream.
    pub fn simple_index_url(&self) -> MirrorResult<Url> {
        match self.role {
            NodeRole::Master => parse_directory_url(&self.simple_url),
            NodeRole::Replica => {
                let master = self.master_url.as_deref().ok_or_else(|| {
                    MirrorError::ConfigInvalid {
                        path: PathBuf::from("mirror.master_url"),
                        reason: "required when mirror.role is replica".to_string(),
                    }
                })?;
                parse_directory_url(master)?
                    .join("root/pypi/+simple/")
                    .map_err(|e| MirrorError::invalid_url(master, e))
            }
        }
    }

    /// Cache expiry as a duration
    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_secs)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Replica wait bound as a duration
    pub fn replica_wait_timeout(&self) -> Option<Duration> {
        self.replica_wait_timeout_secs.map(Duration::from_secs)
    }
}

/// Parse `raw`, making sure the path ends with a slash so joins stay below it
fn parse_directory_url(raw: &str) -> MirrorResult<Url> {
    let mut url = Url::parse(raw).map_err(|e| MirrorError::invalid_url(raw, e))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(MirrorError::invalid_url(raw, "scheme must be http or https"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Local state configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the state directory
    pub state_dir: Option<PathBuf>,
}
