//! Access to provider output URLs.
//!
//! Provider URLs are temporary. The quality gate only inspects metadata; the
//! pipeline downloads each accepted artifact exactly once before copying it
//! into object storage.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_LENGTH, Client};

use crate::error::{WorkerError, WorkerResult};

#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Size reported by a HEAD request. `None` when the server omits it.
    async fn content_length(&self, url: &str) -> WorkerResult<Option<u64>>;

    /// Full artifact body.
    async fn download(&self, url: &str) -> WorkerResult<Vec<u8>>;
}

/// Fetcher backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> WorkerResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::config_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn content_length(&self, url: &str) -> WorkerResult<Option<u64>> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| WorkerError::download_failed(format!("HEAD {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(WorkerError::download_failed(format!(
                "HEAD {} returned {}",
                url,
                response.status()
            )));
        }

        // Body size hint is zero for HEAD; read the header.
        Ok(response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok()))
    }

    async fn download(&self, url: &str) -> WorkerResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WorkerError::download_failed(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(WorkerError::download_failed(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WorkerError::download_failed(format!("Reading {} failed: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_content_length_from_head() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/out/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 734_003]))
            .mount(&server)
            .await;

        let len = fetcher()
            .content_length(&format!("{}/out/clip.mp4", server.uri()))
            .await
            .unwrap();
        assert_eq!(len, Some(734_003));
    }

    #[tokio::test]
    async fn test_unreachable_output_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetcher()
            .content_length(&format!("{}/expired.mp4", server.uri()))
            .await;
        assert!(matches!(result, Err(WorkerError::DownloadFailed(_))));
    }

    #[tokio::test]
    async fn test_download_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/out/photo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let bytes = fetcher()
            .download(&format!("{}/out/photo.png", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
