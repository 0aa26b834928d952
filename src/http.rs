//! Network access.
//!
//! Everything that talks to the network goes through [`HttpClient`], so the
//! synchronizer and the completion adapters can be driven by scripted
//! responses in tests. [`ReqwestClient`] is the real implementation.
//!
//! No request timeouts are applied: a hung connection blocks only the task
//! that issued it.

use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};

use crate::error::{Error, Result};

/// An incrementally readable response body.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// A JSON POST.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

/// Status plus a body that has not been read yet.
pub struct StreamingResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the body into a string.
    pub async fn text(mut self) -> Result<String> {
        let mut bytes = Vec::new();
        while let Some(chunk) = self.body.next().await {
            bytes.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET a buffered text body. Network failures and non-2xx statuses are
    /// [`Error::Fetch`].
    async fn get_text(&self, url: &str) -> Result<String>;

    /// POST a JSON body. Any status is returned; only transport failures
    /// are errors.
    async fn post_stream(&self, request: HttpRequest) -> Result<StreamingResponse>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("livescroll-digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {status}"),
            });
        }

        response.text().await.map_err(|e| Error::fetch(url, e))
    }

    async fn post_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let body = serde_json::to_vec(&request.body)?;
        let mut builder = self
            .client
            .post(&request.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::fetch(&request.url, e))?;
        let status = response.status().as_u16();

        let url = request.url;
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| Error::fetch(&url, e))
            })
            .boxed();

        Ok(StreamingResponse { status, body })
    }
}
