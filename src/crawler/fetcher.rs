//! HTTP fetcher
//!
//! The worker loop only needs "GET this URL": a status code, the body size
//! and the body text, or a transport error. Retrying is the frontier's job,
//! so the fetcher makes exactly one attempt.

use crate::config::UserAgentConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// A response of any HTTP status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status_code: u16,

    /// Length of the raw body in bytes
    pub content_size: u64,

    /// Body decoded as UTF-8, invalid sequences replaced
    pub body: String,
}

/// The request never produced a response
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Request failed for {url}: {message}")]
    Transport { url: String, message: String },
}

/// Performs a single GET
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// Builds an HTTP client with the configured user agent
///
/// # Example
///
/// ```no_run
/// use frontier_crawler::config::UserAgentConfig;
/// use frontier_crawler::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", config.crawler_name, config.crawler_version);

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `reqwest`-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status_code = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| classify_error(url, e))?;

        Ok(FetchResponse {
            status_code,
            content_size: bytes.len() as u64,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&UserAgentConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_returns_any_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("héllo"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&UserAgentConfig::default()).unwrap();

        let ok = fetcher.fetch(&format!("{}/ok", server.uri())).await.unwrap();
        assert_eq!(ok.status_code, 200);
        assert_eq!(ok.body, "héllo");
        assert_eq!(ok.content_size, "héllo".len() as u64);

        let broken = fetcher.fetch(&format!("{}/broken", server.uri())).await.unwrap();
        assert_eq!(broken.status_code, 500);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let fetcher = HttpFetcher::new(&UserAgentConfig::default()).unwrap();
        // Port 9 (discard) on localhost is expected to refuse connections
        let result = fetcher.fetch("http://127.0.0.1:9/").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_invalid_url_is_transport_error() {
        let fetcher = HttpFetcher::new(&UserAgentConfig::default()).unwrap();
        let result = fetcher.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::Transport { .. })));
    }
}
