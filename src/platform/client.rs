//! HTTP fetcher for player scripts and metadata documents

use crate::error::RytError;
use crate::platform::variant::{ClientVariant, ACCEPT_LANGUAGE};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use url::Url;

/// Plain-text fetch of a url with variant specific headers.
///
/// Failures never reach the caller: they are logged and turned into `None`.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, variant: ClientVariant) -> Option<String>;
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Total request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Proxy URL
    pub proxy_url: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            proxy_url: None,
        }
    }
}

/// reqwest backed fetcher
pub struct HttpFetcher {
    client: Client,
    config: HttpClientConfig,
}

impl HttpFetcher {
    /// Create a fetcher with default configuration
    pub fn new() -> Result<Self, RytError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a fetcher with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self, RytError> {
        let mut builder = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .brotli(true);

        if let Some(proxy_url) = &config.proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    /// Get client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Create a GET request with the variant's headers
    pub fn create_request(
        &self,
        url: &str,
        variant: ClientVariant,
    ) -> Result<RequestBuilder, RytError> {
        let url = Url::parse(url)?;
        Ok(self
            .client
            .get(url)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("User-Agent", variant.user_agent()))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, variant: ClientVariant) -> Option<String> {
        let request = match self.create_request(url, variant) {
            Ok(request) => request,
            Err(e) => {
                warn!("Could not fetch url: {}: {}", url, e);
                return None;
            }
        };

        let uri = url.to_string();
        let task = tokio::spawn(async move { fetch_url(request, &uri).await });

        match task.await {
            Ok(Ok(body)) => Some(body),
            Ok(Err(e)) => {
                handle_connection_error(&e);
                None
            }
            Err(e) => {
                warn!("Could not fetch url: {}: {}", url, e);
                None
            }
        }
    }
}

/// Flag network access from the process main thread.
///
/// Fetches are always submitted to the runtime's worker pool, a fetch body
/// running on the main thread is a programming error.
pub fn verify_off_main_thread() {
    let on_main_thread = std::thread::current().name() == Some("main");
    if on_main_thread {
        error!("Network fetch invoked on the main thread");
    }
    debug_assert!(
        !on_main_thread,
        "Network fetch must not run on the main thread"
    );
}

async fn fetch_url(request: RequestBuilder, uri: &str) -> Result<String, RytError> {
    verify_off_main_thread();

    let start_time = Instant::now();
    debug!("fetching url: {}", uri);

    let result = async {
        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RytError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }
        response.text().await.map_err(classify)
    }
    .await;

    debug!(
        "fetched url: {} took: {}ms",
        uri,
        start_time.elapsed().as_millis()
    );
    result
}

fn classify(e: reqwest::Error) -> RytError {
    if e.is_timeout() {
        RytError::TimeoutError(e.to_string())
    } else {
        RytError::RequestFailed(e)
    }
}

fn handle_connection_error(e: &RytError) {
    match e {
        RytError::HttpStatus { .. } => debug!("{}", e),
        RytError::TimeoutError(_) => debug!("Connection timeout: {}", e),
        RytError::RequestFailed(_) => debug!("Network error: {}", e),
        _ => warn!("fetching url failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::variant::{USER_AGENT_MOBILE_WEB, USER_AGENT_TV};
    use std::io::Write;

    #[test]
    fn test_http_client_config_default() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.proxy_url, None);
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let config = HttpClientConfig {
            proxy_url: Some("not a proxy".to_string()),
            ..HttpClientConfig::default()
        };
        assert!(HttpFetcher::with_config(config).is_err());
    }

    #[test]
    fn test_create_request_rejects_invalid_url() {
        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher.create_request("not a url", ClientVariant::Tv);
        assert!(matches!(result, Err(RytError::UrlError(_))));
    }

    #[tokio::test]
    async fn test_fetch_sends_variant_headers() {
        let mut server = mockito::Server::new_async().await;
        let tv = server
            .mock("GET", "/tv")
            .match_header("user-agent", USER_AGENT_TV)
            .match_header("accept-language", "en-US,en")
            .with_status(200)
            .with_body("tv body")
            .create_async()
            .await;
        let mobile = server
            .mock("GET", "/mobile")
            .match_header("user-agent", USER_AGENT_MOBILE_WEB)
            .with_status(200)
            .with_body("mobile body")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let body = fetcher
            .fetch(&format!("{}/tv", server.url()), ClientVariant::Tv)
            .await;
        assert_eq!(body.as_deref(), Some("tv body"));

        let body = fetcher
            .fetch(&format!("{}/mobile", server.url()), ClientVariant::MobileWeb)
            .await;
        assert_eq!(body.as_deref(), Some("mobile body"));

        tv.assert_async().await;
        mobile.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("not here")
            .create_async()
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let body = fetcher
            .fetch(&format!("{}/missing", server.url()), ClientVariant::Tv)
            .await;
        assert_eq!(body, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.fetch("::::", ClientVariant::Tv).await, None);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/slow")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(1500));
                w.write_all(b"late")
            })
            .create_async()
            .await;

        let config = HttpClientConfig {
            timeout: Duration::from_millis(300),
            ..HttpClientConfig::default()
        };
        let fetcher = HttpFetcher::with_config(config).unwrap();
        let body = fetcher
            .fetch(&format!("{}/slow", server.url()), ClientVariant::Tv)
            .await;
        assert_eq!(body, None);
    }
}
