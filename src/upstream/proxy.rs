//! Directory proxy for the upstream's full project listing

use crate::links::Link;
use crate::name::ProjectName;
use crate::upstream::HttpFetch;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};
use url::Url;

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector"));

/// Client for the root page of a simple index
pub struct SimpleIndexProxy {
    simple_url: Url,
    http: Arc<dyn HttpFetch>,
}

impl SimpleIndexProxy {
    /// Create a proxy for the index rooted at `simple_url`
    pub fn new(simple_url: Url, http: Arc<dyn HttpFetch>) -> Self {
        Self { simple_url, http }
    }

    /// The index root this proxy lists
    pub fn simple_url(&self) -> &Url {
        &self.simple_url
    }

    /// Every project listed upstream, each with the placeholder serial `-1`
    ///
    /// Only links on the index's own host and below its path count.
    /// Returns `None` if the listing cannot be fetched.
    pub async fn list_packages_with_serial(&self) -> Option<HashMap<ProjectName, i64>> {
        let response = match self.http.get(&self.simple_url).await {
            Ok(response) => response,
            Err(e) => {
                warn!("error {} with remote {}", e, self.simple_url);
                return None;
            }
        };
        if response.status != 200 {
            warn!(
                "remote {} responded with status {}",
                self.simple_url, response.status
            );
            return None;
        }

        let document = Html::parse_document(&response.body);
        let mut name2serials = HashMap::new();
        for href in document
            .select(&ANCHORS)
            .filter_map(|anchor| anchor.value().attr("href"))
        {
            let Some(link) = Link::join(&response.url, href) else {
                continue;
            };
            if !self.is_below_index(link.url()) {
                continue;
            }
            let mut name = link.basename();
            if name.is_empty() {
                name = link.parent_basename();
            }
            if name.is_empty() {
                continue;
            }
            name2serials.insert(ProjectName::new(&name), -1);
        }
        info!(
            "retrieved {} project names from {}",
            name2serials.len(),
            self.simple_url
        );
        Some(name2serials)
    }

    fn is_below_index(&self, url: &Url) -> bool {
        url.scheme() == self.simple_url.scheme()
            && url.host_str() == self.simple_url.host_str()
            && url.port_or_known_default() == self.simple_url.port_or_known_default()
            && url.path().starts_with(self.simple_url.path())
            && url.path() != self.simple_url.path()
    }
}
