//! Simple index page parsing
//!
//! Extracts release links, egg links and pages worth crawling from the
//! HTML a simple index serves for one project.

use crate::error::{MirrorError, MirrorResult};
use crate::links::link::Link;
use crate::links::meta::{compare_release_links, is_archive_of_project};
use crate::name::ProjectName;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

static ANCHORS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector"));
static BASE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("base selector"));

/// `rel` values marking pages that may list more release files
const CRAWL_RELS: &[&str] = &["homepage", "download"];

/// Links collected for one project across its index page and crawled pages
#[derive(Debug, Clone)]
pub struct LinkSet {
    project: ProjectName,
    egglinks: Vec<Link>,
    basename2link: HashMap<String, Link>,
    crawllinks: HashSet<Url>,
}

impl LinkSet {
    /// Create an empty link set for `project`
    pub fn new(project: ProjectName) -> Self {
        Self {
            project,
            egglinks: Vec::new(),
            basename2link: HashMap::new(),
            crawllinks: HashSet::new(),
        }
    }

    /// The project these links belong to
    pub fn project(&self) -> &ProjectName {
        &self.project
    }

    /// Egg links, most recently discovered first
    pub fn egglinks(&self) -> &[Link] {
        &self.egglinks
    }

    /// Pages discovered for crawling
    pub fn crawllinks(&self) -> &HashSet<Url> {
        &self.crawllinks
    }

    /// Release links: egg links first, then archives by descending version
    pub fn release_links(&self) -> Vec<Link> {
        let mut archives: Vec<&Link> = self.basename2link.values().collect();
        archives.sort_by(|a, b| compare_release_links(b, a));
        self.egglinks
            .iter()
            .chain(archives)
            .cloned()
            .collect()
    }

    /// Merge `link` unless a link for the same basename is at least as good
    ///
    /// A hashed link replaces an unhashed one; otherwise the first link
    /// seen for a basename wins.
    pub fn merge_if_better(&mut self, link: Link) {
        let basename = link.basename();
        let replace = match self.basename2link.get(&basename) {
            None => true,
            Some(existing) => existing.hash_spec().is_none() && link.hash_spec().is_some(),
        };
        if replace {
            debug!("indexparser: adding link {}", link);
            self.basename2link.insert(basename, link);
        } else {
            debug!("indexparser: ignoring candidate link {}", link);
        }
    }

    /// Parse an index page served at `base_url`
    ///
    /// With `scrape` set, egg links are collected and `rel` links are
    /// queued for crawling; crawled pages are parsed without it so the
    /// crawl never goes deeper than one hop.
    pub fn parse_index(&mut self, base_url: &Url, html: &str, scrape: bool) {
        let document = Html::parse_document(html);
        let base = document_base(&document, base_url);
        let mut seen: HashSet<String> = HashSet::new();

        for anchor in document.select(&ANCHORS) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(link) = Link::join(&base, href) else {
                continue;
            };

            if scrape {
                if let Some(egg) = link.egg_fragment() {
                    self.add_egglink(&link, egg);
                    continue;
                }
            }

            if is_archive_of_project(&link, &self.project) {
                seen.insert(link.url().to_string());
                self.merge_if_better(link);
            }
        }

        if !scrape {
            return;
        }
        for anchor in document.select(&ANCHORS) {
            let is_crawl_rel = anchor
                .value()
                .attr("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|r| CRAWL_RELS.contains(&r)));
            if !is_crawl_rel {
                continue;
            }
            let Some(link) = anchor
                .value()
                .attr("href")
                .and_then(|href| Link::join(&base, href))
            else {
                continue;
            };
            if !seen.contains(link.url().as_str()) {
                self.crawllinks.insert(link.url().clone());
            }
        }
    }

    fn add_egglink(&mut self, link: &Link, egg: &str) {
        if !ProjectName::new(egg).as_str().starts_with(self.project.as_str()) {
            debug!("skip egg link {} (project: {})", link, self.project);
            return;
        }
        if link.basename().is_empty() {
            warn!(
                "cannot handle egg directory link (svn?) skipping: {} (project: {})",
                link, self.project
            );
            return;
        }
        // later egg links take precedence, installers rely on this order
        if !self.egglinks.contains(link) {
            self.egglinks.insert(0, link.clone());
        }
    }
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    document
        .select(&BASE)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page_url.join(href).ok())
        .unwrap_or_else(|| page_url.clone())
}

/// Parse the index page of the project named by `url`
///
/// The project is the last path segment of `url`, or the one before it
/// for directory URLs.
pub fn parse_index(url: &str, html: &str, scrape: bool) -> MirrorResult<LinkSet> {
    let link = Link::parse(url).ok_or_else(|| MirrorError::invalid_url(url, "not an http url"))?;
    let mut project = link.basename();
    if project.is_empty() {
        project = link.parent_basename();
    }
    if project.is_empty() {
        return Err(MirrorError::invalid_url(url, "no project name in path"));
    }
    let mut links = LinkSet::new(ProjectName::new(&project));
    links.parse_index(link.url(), html, scrape);
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://pypi.org/simple/py/";

    fn basenames(links: &[Link]) -> Vec<String> {
        links.iter().map(Link::basename).collect()
    }

    #[test]
    fn infers_project_from_url() {
        let links = parse_index(URL, "", true).unwrap();
        assert_eq!(links.project().as_str(), "py");
        let links = parse_index("https://pypi.org/simple/Py_Lib", "", true).unwrap();
        assert_eq!(links.project().as_str(), "py-lib");
        assert!(parse_index("https://pypi.org/", "", true).is_err());
    }

    #[test]
    fn collects_archives_of_project_only() {
        let html = r#"
            <a href="../../pkg/py-1.0.tar.gz">py</a>
            <a href="../../pkg/pytest-2.0.tar.gz">other project</a>
            <a href="../../pkg/py-1.0.html">not an archive</a>
            <a href="javascript:void(0)">js</a>
            <a>no href</a>
        "#;
        let links = parse_index(URL, html, true).unwrap();
        assert_eq!(basenames(&links.release_links()), vec!["py-1.0.tar.gz"]);
        assert_eq!(
            links.release_links()[0].url().as_str(),
            "https://pypi.org/pkg/py-1.0.tar.gz"
        );
    }

    #[test]
    fn hashed_link_wins_regardless_of_order() {
        let plain = r#"<a href="/pkg/py-1.0.zip">a</a>"#;
        let hashed = r#"<a href="/other/py-1.0.zip#md5=1234">b</a>"#;

        for html in [format!("{plain}{hashed}"), format!("{hashed}{plain}")] {
            let links = parse_index(URL, &html, true).unwrap();
            let release = links.release_links();
            assert_eq!(release.len(), 1);
            assert_eq!(release[0].hash_spec(), Some("md5=1234"));
        }
    }

    #[test]
    fn first_link_wins_without_hashes() {
        let html = r#"
            <a href="/first/py-1.0.zip#md5=1">a</a>
            <a href="/second/py-1.0.zip#md5=2">b</a>
        "#;
        let links = parse_index(URL, html, true).unwrap();
        assert_eq!(
            links.release_links()[0].url().as_str(),
            "https://pypi.org/first/py-1.0.zip#md5=1"
        );
    }

    #[test]
    fn egg_links_are_front_inserted() {
        let html = r#"
            <a href="http://a.example/py/one#egg=py-dev">e1</a>
            <a href="http://b.example/py/two#egg=py-dev">e2</a>
            <a href="http://a.example/py/one#egg=py-dev">e1 again</a>
        "#;
        let links = parse_index(URL, html, true).unwrap();
        assert_eq!(basenames(links.egglinks()), vec!["two", "one"]);
    }

    #[test]
    fn egg_links_are_filtered() {
        let html = r#"
            <a href="http://a.example/other/trunk#egg=other-dev">foreign</a>
            <a href="http://a.example/svn/#egg=py-dev">directory</a>
            <a href="http://a.example/py/trunk#egg=Py-Dev">kept</a>
        "#;
        let links = parse_index(URL, html, true).unwrap();
        assert_eq!(basenames(links.egglinks()), vec!["trunk"]);
        assert_eq!(links.egglinks()[0].url().host_str(), Some("a.example"));
    }

    #[test]
    fn release_links_sorted_by_descending_version() {
        let html = r#"
            <a href="/pkg/py-1.0.tar.gz">1.0</a>
            <a href="/pkg/py-2.0.tar.gz">2.0</a>
            <a href="/pkg/py-1.5.tar.gz">1.5</a>
            <a href="http://a.example/py/trunk#egg=py-dev">egg</a>
        "#;
        let links = parse_index(URL, html, true).unwrap();
        assert_eq!(
            basenames(&links.release_links()),
            vec!["trunk", "py-2.0.tar.gz", "py-1.5.tar.gz", "py-1.0.tar.gz"]
        );
    }

    #[test]
    fn rel_links_become_crawl_links() {
        let html = r#"
            <a href="https://py.example/" rel="homepage">home</a>
            <a href="https://py.example/download/" rel="download nofollow">dl</a>
            <a href="https://py.example/about/" rel="nofollow">about</a>
            <a href="/pkg/py-1.0.zip" rel="download">archive</a>
        "#;
        let links = parse_index(URL, html, true).unwrap();
        let mut crawl: Vec<&str> = links.crawllinks().iter().map(Url::as_str).collect();
        crawl.sort();
        assert_eq!(
            crawl,
            vec!["https://py.example/", "https://py.example/download/"]
        );
    }

    #[test]
    fn no_scrape_ignores_eggs_and_rel_links() {
        let html = r#"
            <a href="https://py.example/" rel="homepage">home</a>
            <a href="http://a.example/py/trunk#egg=py-dev">egg</a>
            <a href="/pkg/py-1.0.zip">archive</a>
        "#;
        let links = parse_index(URL, html, false).unwrap();
        assert!(links.crawllinks().is_empty());
        assert!(links.egglinks().is_empty());
        assert_eq!(basenames(&links.release_links()), vec!["py-1.0.zip"]);
    }

    #[test]
    fn honors_base_href() {
        let html = r#"
            <html><head><base href="https://files.example/dist/"></head>
            <body><a href="py-1.0.zip">archive</a></body></html>
        "#;
        let links = parse_index(URL, html, true).unwrap();
        assert_eq!(
            links.release_links()[0].url().as_str(),
            "https://files.example/dist/py-1.0.zip"
        );
    }
}
