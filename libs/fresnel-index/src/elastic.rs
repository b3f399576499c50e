use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{Map, Value, json};

use fresnel_api::error::BackendError;
use fresnel_api::index::SearchIndex;

/// SearchIndex backend for an Elasticsearch-compatible HTTP service.
///
/// One client per process, reused across all operations; reqwest's client
/// is safe for concurrent use.
pub struct ElasticIndex {
    http: reqwest::Client,
    base_url: String,
}

impl ElasticIndex {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn doc_url(&self, index: &str, id: &str) -> String {
        format!("{}/{index}/_doc/{id}", self.base_url)
    }

    /// Issue a request; any non-2xx status becomes an Io error carrying
    /// the response body. `allow_missing` maps 404 to success (delete of
    /// an absent document is a no-op, not a failure).
    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        allow_missing: bool,
    ) -> Result<(), BackendError> {
        let resp = req
            .send()
            .await
            .map_err(|e| BackendError::io(format!("index request: {e}")))?;

        let status = resp.status();
        if status.is_success() || (allow_missing && status == reqwest::StatusCode::NOT_FOUND) {
            return Ok(());
        }

        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
        Err(BackendError::io(format!("index responded {status}: {body}")))
    }
}

impl SearchIndex for ElasticIndex {
    fn index(
        &self,
        index: &str,
        id: &str,
        doc: &Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let req = self.http.put(self.doc_url(index, id)).json(doc);
        Box::pin(async move { self.send(req, false).await })
    }

    fn update(
        &self,
        index: &str,
        id: &str,
        doc: &Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let url = format!("{}/{index}/_update/{id}", self.base_url);
        let req = self.http.post(url).json(&json!({ "doc": doc }));
        Box::pin(async move { self.send(req, false).await })
    }

    fn delete(
        &self,
        index: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let req = self.http.delete(self.doc_url(index, id));
        Box::pin(async move { self.send(req, true).await })
    }
}

impl std::fmt::Debug for ElasticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticIndex")
            .field("base_url", &self.base_url)
            .finish()
    }
}
