//! Release file metadata derived from basenames
//!
//! Splits `name-version.ext` style basenames and orders them the way
//! setuptools' legacy `parse_version` does, which is what installers
//! expect from a simple page.

use crate::links::link::Link;
use crate::name::{normalize_name, ProjectName};
use std::cmp::Ordering;

/// Recognized release file extensions, longest first
const ARCHIVE_EXTENSIONS: &[&str] = &[
    ".tar.bz2", ".tar.gz", ".tar.xz", ".tar.Z", ".tbz", ".tgz", ".tar", ".zip", ".whl", ".egg",
    ".exe", ".msi", ".dmg", ".rpm", ".deb",
];

/// Name, version and extension of a release file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasenameMeta {
    /// Project name as spelled in the file name
    pub name: String,
    /// Version string as spelled in the file name
    pub version: String,
    /// Archive extension including the leading dot
    pub ext: String,
}

impl BasenameMeta {
    /// Split a basename, returning `None` for non-archives
    pub fn parse(basename: &str) -> Option<Self> {
        let ext = ARCHIVE_EXTENSIONS
            .iter()
            .find(|ext| basename.len() > ext.len() && basename.ends_with(*ext))?;
        let stem = &basename[..basename.len() - ext.len()];

        let (name, version) = match *ext {
            // name-version-tags for binary distributions
            ".whl" | ".egg" => {
                let mut parts = stem.splitn(3, '-');
                (parts.next()?, parts.next()?)
            }
            _ => split_name_version(stem)?,
        };
        if name.is_empty() || version.is_empty() {
            return None;
        }

        let version = match *ext {
            ".exe" | ".msi" => version
                .split_once(".win")
                .map_or(version, |(version, _platform)| version),
            _ => version,
        };

        Some(Self {
            name: name.to_string(),
            version: version.to_string(),
            ext: ext.to_string(),
        })
    }

    /// Parsed version key of this file
    pub fn version_key(&self) -> LegacyVersion {
        LegacyVersion::parse(&self.version)
    }

    fn sort_key(&self) -> (String, LegacyVersion, &str) {
        (normalize_name(&self.name), self.version_key(), &self.ext)
    }
}

/// Split `name-version` at the first dash followed by a digit
fn split_name_version(stem: &str) -> Option<(&str, &str)> {
    stem.match_indices('-').find_map(|(idx, _)| {
        let version = &stem[idx + 1..];
        version
            .starts_with(|c: char| c.is_ascii_digit())
            .then(|| (&stem[..idx], version))
    })
}

/// Check if a link is a release file of `project`
pub fn is_archive_of_project(link: &Link, project: &ProjectName) -> bool {
    BasenameMeta::parse(&link.basename()).is_some_and(|meta| project.matches(&meta.name))
}

/// Version of a release file, or `None` if the basename cannot be split
pub fn version_of(basename: &str) -> Option<String> {
    BasenameMeta::parse(basename).map(|meta| meta.version)
}

/// Compare two links by project, version and extension
pub fn compare_release_links(a: &Link, b: &Link) -> Ordering {
    let (a_base, b_base) = (a.basename(), b.basename());
    match (BasenameMeta::parse(&a_base), BasenameMeta::parse(&b_base)) {
        (Some(a_meta), Some(b_meta)) => a_meta
            .sort_key()
            .cmp(&b_meta.sort_key())
            .then_with(|| a_base.cmp(&b_base)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a_base.cmp(&b_base),
    }
}

/// Version key compatible with setuptools' legacy version ordering
///
/// Numeric parts are zero-padded, alphabetic parts are prefixed with `*`
/// and trailing zeros are dropped so `1.0 == 1.0.0`. Pre-release tags
/// (`a`, `b`, `c`, `rc`, `pre`, `dev`) sort before `*final`, post-release
/// tags after it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LegacyVersion(Vec<String>);

impl LegacyVersion {
    /// Parse a version string
    pub fn parse(version: &str) -> Self {
        let mut parts: Vec<String> = Vec::new();
        for part in version_components(&version.to_lowercase()) {
            if part.starts_with('*') {
                if part.as_str() < "*final" {
                    while parts.last().is_some_and(|last| last == "*final-") {
                        parts.pop();
                    }
                }
                while parts.last().is_some_and(|last| last == "00000000") {
                    parts.pop();
                }
            }
            parts.push(part);
        }
        Self(parts)
    }
}

fn version_components(version: &str) -> Vec<String> {
    let mut components = Vec::new();
    let mut chars = version.chars().peekable();
    while let Some(&ch) = chars.peek() {
        let raw = if ch.is_ascii_digit() {
            take_while(&mut chars, |c| c.is_ascii_digit())
        } else if ch.is_ascii_lowercase() {
            take_while(&mut chars, |c| c.is_ascii_lowercase())
        } else {
            chars.next();
            ch.to_string()
        };

        let part = match raw.as_str() {
            "pre" | "preview" | "rc" => "c",
            "-" => "final-",
            "dev" => "@",
            other => other,
        };
        if part.is_empty() || part == "." {
            continue;
        }
        if part.starts_with(|c: char| c.is_ascii_digit()) {
            components.push(format!("{:0>8}", part));
        } else {
            components.push(format!("*{part}"));
        }
    }
    components.push("*final".to_string());
    components
}

fn take_while(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    pred: impl Fn(char) -> bool,
) -> String {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if !pred(c) {
            break;
        }
        out.push(c);
        chars.next();
    }
    out
}
