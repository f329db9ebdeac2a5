//! Project name normalization
//!
//! Every lookup, cache key and serial table key uses the normalized form:
//! lowercase, with each run of `-`, `_` and `.` collapsed to a single `-`.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Normalize a raw project name
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_separator = false;
    for ch in raw.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
                in_separator = true;
            }
        } else {
            out.extend(ch.to_lowercase());
            in_separator = false;
        }
    }
    out
}

/// A normalized project name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    /// Create a project name, normalizing the raw input
    pub fn new(raw: &str) -> Self {
        Self(normalize_name(raw))
    }

    /// The normalized name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if another (possibly raw) name refers to this project
    pub fn matches(&self, raw: &str) -> bool {
        normalize_name(raw) == self.0
    }
}

impl From<String> for ProjectName {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for ProjectName {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<ProjectName> for String {
    fn from(name: ProjectName) -> Self {
        name.0
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ProjectName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
