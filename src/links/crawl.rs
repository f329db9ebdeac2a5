//! Single-hop crawling of pages linked from an index page

use crate::links::parser::LinkSet;
use crate::upstream::HttpFetch;
use std::collections::HashSet;
use tracing::{info, warn};

/// Fetch every crawl link of `links` and merge the archives found there
///
/// Crawled pages are parsed without scraping, so they cannot queue more
/// pages. Failed fetches are logged and skipped.
pub async fn perform_crawling(links: &mut LinkSet, http: &dyn HttpFetch) {
    let mut pending: HashSet<_> = links.crawllinks().clone();
    while let Some(crawlurl) = pending.iter().next().cloned() {
        pending.remove(&crawlurl);
        info!("visiting crawlurl {}", crawlurl);

        let response = match http.get(&crawlurl).await {
            Ok(response) => response,
            Err(e) => {
                warn!("crawlurl {} failed: {}", crawlurl, e);
                continue;
            }
        };
        info!("crawlurl {} {}", crawlurl, response.status);

        if response.status == 200 && response.is_html() {
            links.parse_index(&response.url, &response.body, false);
            continue;
        }
        warn!("crawlurl {} status {}", crawlurl, response.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::parse_index;
    use crate::upstream::testing::FakeHttp;
    use crate::upstream::HttpResponse;
    use url::Url;

    const INDEX: &str = "https://pypi.org/simple/py/";

    fn html_page(url: &str, body: &str) -> HttpResponse {
        HttpResponse::new(200, Url::parse(url).unwrap())
            .with_header("content-type", "text/html")
            .with_body(body)
    }

    #[tokio::test]
    async fn merges_links_from_crawled_pages() {
        let http = FakeHttp::new();
        http.reply(html_page(
            "https://py.example/download/",
            r#"<a href="py-3.0.tar.gz">3.0</a>
               <a href="https://py.example/deeper/" rel="download">deeper</a>"#,
        ));

        let mut links = parse_index(
            INDEX,
            r#"<a href="/pkg/py-1.0.tar.gz">1.0</a>
               <a href="https://py.example/download/" rel="download">dl</a>"#,
            true,
        )
        .unwrap();
        perform_crawling(&mut links, &http).await;

        let basenames: Vec<String> = links.release_links().iter().map(|l| l.basename()).collect();
        assert_eq!(basenames, vec!["py-3.0.tar.gz", "py-1.0.tar.gz"]);
        assert_eq!(http.requests(), vec!["https://py.example/download/"]);
    }

    #[tokio::test]
    async fn failed_and_non_html_pages_are_skipped() {
        let http = FakeHttp::new();
        http.reply(HttpResponse::new(
            500,
            Url::parse("https://py.example/broken/").unwrap(),
        ));
        http.reply(
            HttpResponse::new(200, Url::parse("https://py.example/plain/").unwrap())
                .with_header("content-type", "text/plain")
                .with_body(r#"<a href="py-9.0.tar.gz">9.0</a>"#),
        );

        let mut links = parse_index(
            INDEX,
            r#"<a href="https://py.example/broken/" rel="homepage">home</a>
               <a href="https://py.example/plain/" rel="download">dl</a>
               <a href="https://py.example/unreachable/" rel="download">gone</a>"#,
            true,
        )
        .unwrap();
        perform_crawling(&mut links, &http).await;

        assert!(links.release_links().is_empty());
        assert_eq!(http.requests().len(), 3);
    }
}
