//! Candidate links found on index pages

use percent_encoding::percent_decode_str;
use std::fmt;
use url::Url;

/// Digest algorithms accepted in a `#<algo>=<hex>` fragment
const HASH_ALGORITHMS: &[&str] = &["md5", "sha1", "sha224", "sha256", "sha384", "sha512"];

/// A hyperlink parsed from an index page
///
/// Equality compares the full URL, fragment included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    url: Url,
}

impl Link {
    /// Resolve `href` against `base`
    ///
    /// Returns `None` if the result is not an absolute HTTP(S) URL.
    pub fn join(base: &Url, href: &str) -> Option<Self> {
        let url = base.join(href.trim()).ok()?;
        Self::from_url(url)
    }

    /// Parse an absolute URL string
    pub fn parse(url: &str) -> Option<Self> {
        Self::from_url(Url::parse(url.trim()).ok()?)
    }

    fn from_url(url: Url) -> Option<Self> {
        let link = Self { url };
        link.is_valid_http_url().then_some(link)
    }

    /// Check the link is http or https with a host
    pub fn is_valid_http_url(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https") && self.url.host_str().is_some()
    }

    /// The absolute URL including fragment
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL without its fragment
    pub fn url_nofrag(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }

    /// Percent-decoded last path segment; empty for directory URLs
    pub fn basename(&self) -> String {
        let last = self
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("");
        percent_decode_str(last).decode_utf8_lossy().into_owned()
    }

    /// Basename of the parent path segment
    pub fn parent_basename(&self) -> String {
        let segments: Vec<&str> = self
            .url
            .path_segments()
            .map(|segments| segments.collect())
            .unwrap_or_default();
        match segments.len() {
            0 | 1 => String::new(),
            n => percent_decode_str(segments[n - 2])
                .decode_utf8_lossy()
                .into_owned(),
        }
    }

    /// The `<algo>=<hex>` fragment, if the link carries a digest
    pub fn hash_spec(&self) -> Option<&str> {
        let fragment = self.url.fragment()?;
        let (algo, value) = fragment.split_once('=')?;
        (HASH_ALGORITHMS.contains(&algo) && !value.is_empty()).then_some(fragment)
    }

    /// The `egg=<spec>` fragment value, if present
    pub fn egg_fragment(&self) -> Option<&str> {
        self.url
            .fragment()?
            .split('&')
            .find_map(|part| part.strip_prefix("egg="))
            .filter(|spec| !spec.is_empty())
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Link {}>", self.url)
    }
}
