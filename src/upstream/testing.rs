//! Canned HTTP responses for tests

use crate::error::{MirrorError, MirrorResult};
use crate::upstream::{HttpFetch, HttpResponse};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use url::Url;

/// `HttpFetch` serving queued responses per URL
///
/// The last queued response for a URL keeps being served. Unknown URLs
/// fail as unreachable.
#[derive(Default)]
pub(crate) struct FakeHttp {
    replies: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue `response` for a GET of `response.url`
    pub(crate) fn reply(&self, response: HttpResponse) {
        let url = response.url.to_string();
        self.reply_for(&url, response);
    }

    /// Queue `response` for a GET of `url` (e.g. to model redirects)
    pub(crate) fn reply_for(&self, url: &str, response: HttpResponse) {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// URLs requested so far, in order
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpFetch for FakeHttp {
    async fn get(&self, url: &Url) -> MirrorResult<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        let mut replies = self.replies.lock().unwrap();
        let queue = replies.get_mut(url.as_str());
        let response = match queue {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        response.ok_or_else(|| MirrorError::UpstreamUnreachable {
            url: url.to_string(),
            reason: "connection refused".to_string(),
        })
    }
}
