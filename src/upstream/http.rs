//! HTTP access to the upstream index
//!
//! The mirror only ever issues GET requests with redirects followed. The
//! `HttpFetch` trait keeps the stage testable with canned responses.

use crate::error::{MirrorError, MirrorResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::ResponseExt;
use url::Url;

/// Header carrying the upstream's last serial for a project
pub const PYPI_SERIAL_HEADER: &str = "X-PYPI-LAST-SERIAL";

/// Header carrying the master's transaction serial on proxied responses
pub const DEVPI_SERIAL_HEADER: &str = "X-DEVPI-SERIAL";

/// Largest response body read from upstream (full listings are big)
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

const MAX_REDIRECTS: u32 = 10;

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Final URL after redirects
    pub url: Url,
    /// Headers with lowercased names
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// Create a response with no headers and an empty body
    pub fn new(status: u16, url: Url) -> Self {
        Self {
            status,
            url,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Check for a `text/html` content type
    pub fn is_html(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("text/html"))
    }

    /// The upstream project serial, `-1` when the header is absent
    pub fn pypi_serial(&self) -> MirrorResult<i64> {
        match self.header(PYPI_SERIAL_HEADER) {
            None => Ok(-1),
            Some(value) => value.trim().parse().map_err(|_| {
                MirrorError::Upstream(format!(
                    "invalid {} header {:?} from {}",
                    PYPI_SERIAL_HEADER, value, self.url
                ))
            }),
        }
    }

    /// The master's transaction serial, if the header is present
    pub fn devpi_serial(&self) -> MirrorResult<Option<u64>> {
        self.header(DEVPI_SERIAL_HEADER)
            .map(|value| {
                value.trim().parse().map_err(|_| {
                    MirrorError::Upstream(format!(
                        "invalid {} header {:?} from {}",
                        DEVPI_SERIAL_HEADER, value, self.url
                    ))
                })
            })
            .transpose()
    }
}

/// Issues GET requests against the upstream index
#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// GET `url`, following redirects
    ///
    /// Any status is a successful fetch; only transport failures are errors.
    async fn get(&self, url: &Url) -> MirrorResult<HttpResponse>;
}

/// `HttpFetch` implementation backed by a blocking `ureq` agent
#[derive(Clone)]
pub struct UreqFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl UreqFetcher {
    /// Create a fetcher with a global per-request timeout
    pub fn new(timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(MAX_REDIRECTS)
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            user_agent: format!("simplemirror/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    fn get_blocking(&self, url: &Url) -> MirrorResult<HttpResponse> {
        let unreachable = |e: ureq::Error| MirrorError::UpstreamUnreachable {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let mut response = self
            .agent
            .get(url.as_str())
            .header("User-Agent", self.user_agent.as_str())
            .header("Accept", "text/html")
            .call()
            .map_err(unreachable)?;

        let final_url = Url::parse(&response.get_uri().to_string()).unwrap_or_else(|_| url.clone());
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
            })
            .collect();
        let status = response.status().as_u16();
        let bytes = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(unreachable)?;
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|value| value.to_str().ok());
        let body = decode_body(bytes, content_type);

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse {
            status,
            url: final_url,
            headers,
            body,
        })
    }
}

/// Decode a response body using the charset of its content type
///
/// Latin-1 bodies map byte for byte; anything else is read as UTF-8 with
/// invalid sequences replaced, so a badly encoded page still yields its links.
fn decode_body(bytes: Vec<u8>, content_type: Option<&str>) -> String {
    let charset = content_type.and_then(|ct| {
        ct.split(';')
            .filter_map(|param| param.trim().split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
            .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
    });
    match charset.as_deref() {
        Some("iso-8859-1" | "latin-1" | "latin1" | "l1") => {
            bytes.into_iter().map(char::from).collect()
        }
        _ => match String::from_utf8(bytes) {
            Ok(body) => body,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        },
    }
}

#[async_trait]
impl HttpFetch for UreqFetcher {
    async fn get(&self, url: &Url) -> MirrorResult<HttpResponse> {
        let fetcher = self.clone();
        let url = url.clone();
        tokio::task::spawn_blocking(move || fetcher.get_blocking(&url))
            .await
            .map_err(|e| MirrorError::Internal(format!("HTTP task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn response() -> HttpResponse {
        HttpResponse::new(200, Url::parse("https://pypi.org/simple/py/").unwrap())
    }

    #[test]
    fn headers_are_case_insensitive() {
        let resp = response().with_header("Content-Type", "Text/HTML; charset=utf-8");
        assert_eq!(resp.header("content-type"), Some("Text/HTML; charset=utf-8"));
        assert!(resp.is_html());
        assert!(!response().is_html());
    }

    #[test]
    fn pypi_serial_defaults_to_unknown() {
        assert_eq!(response().pypi_serial().unwrap(), -1);
        let resp = response().with_header(PYPI_SERIAL_HEADER, "42");
        assert_eq!(resp.pypi_serial().unwrap(), 42);
        let resp = response().with_header(PYPI_SERIAL_HEADER, "forty-two");
        assert!(resp.pypi_serial().unwrap_err().is_upstream());
    }

    #[test]
    fn latin1_body_is_decoded() {
        let body = decode_body(
            b"<a href=\"caf\xe9-1.0.zip\">caf\xe9</a>".to_vec(),
            Some("text/html; charset=ISO-8859-1"),
        );
        assert_eq!(body, "<a href=\"caf\u{e9}-1.0.zip\">caf\u{e9}</a>");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let body = decode_body(b"<a href=\"py-1.0.zip\">\xe9</a>".to_vec(), Some("text/html"));
        assert_eq!(body, "<a href=\"py-1.0.zip\">\u{fffd}</a>");
        assert_eq!(decode_body(b"ok".to_vec(), None), "ok");
    }

    /// Serve one canned raw HTTP response on a local port
    fn serve_once(raw: &'static [u8]) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(raw).unwrap();
        });
        Url::parse(&format!("http://{}/simple/py/", addr)).unwrap()
    }

    #[tokio::test]
    async fn non_utf8_page_is_fetched() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\n\
              Content-Type: text/html; charset=iso-8859-1\r\n\
              Content-Length: 31\r\n\
              Connection: close\r\n\r\n\
              <a href=\"py-1.0.zip\">py \xe9t\xe9</a>",
        );

        let response = UreqFetcher::new(Duration::from_secs(5))
            .get(&url)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert!(response.is_html());
        assert!(response.body.contains("py-1.0.zip"));
        assert!(response.body.contains("\u{e9}t\u{e9}"));
    }

    #[test]
    fn devpi_serial_is_optional() {
        assert_eq!(response().devpi_serial().unwrap(), None);
        let resp = response().with_header("x-devpi-serial", "7");
        assert_eq!(resp.devpi_serial().unwrap(), Some(7));
    }
}
