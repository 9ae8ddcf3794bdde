//! HTTP fetch client
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the shared HTTP client with timeouts
//! - Rotating browser identities (header sets) across advertisement requests
//! - Classifying transport and status failures into [`FetchError`]
//!
//! There is no retry at this layer. Callers decide whether a failure costs
//! one advertisement or a whole manufacturer.

use crate::config::{CrawlerConfig, HeaderProfile};
use crate::{FetchError, TransportKind};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::Client;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";
const FIREFOX_109: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/109.0";
const FIREFOX_117: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/117.0";
const CHROME_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,\
     image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7";
const GOOGLE_REFERER: &str = "https://www.google.com/";

/// A successfully fetched document
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Response body
    pub body: String,
}

/// Browser identities used for outgoing requests
///
/// Listing pages always use the listing identity. Advertisement requests pick
/// one of the rotation identities from a hash of the URL, so the choice is
/// stable per link and needs no shared counter.
#[derive(Debug, Clone)]
pub struct HeaderPool {
    listing: HeaderProfile,
    rotation: Vec<HeaderProfile>,
}

impl HeaderPool {
    /// The three desktop browser identities plus a Chrome listing identity
    pub fn builtin() -> Self {
        let chrome = HeaderProfile {
            user_agent: CHROME_MAC.to_string(),
            accept: Some(CHROME_ACCEPT.to_string()),
            accept_language: Some("pl-PL,pl;q=0.9,en-US;q=0.8,en;q=0.7".to_string()),
            referer: Some(GOOGLE_REFERER.to_string()),
        };

        let rotation = vec![
            chrome.clone(),
            HeaderProfile {
                user_agent: FIREFOX_109.to_string(),
                accept: Some(
                    "text/html,application/xhtml+xml,application/xml;q=0.9,\
                     image/avif,image/webp,image/apng,*/*;q=0.8"
                        .to_string(),
                ),
                accept_language: Some("pl-PL,pl;q=0.9,en-US,en;q=0.7".to_string()),
                referer: Some(GOOGLE_REFERER.to_string()),
            },
            HeaderProfile {
                user_agent: FIREFOX_117.to_string(),
                accept: Some(
                    "text/html,application/xhtml+xml,application/xml;q=0.9,\
                     image/avif,image/webp,*/*;q=0.8"
                        .to_string(),
                ),
                accept_language: Some("pl,en-US;q=0.7,en;q=0.3".to_string()),
                referer: Some(GOOGLE_REFERER.to_string()),
            },
        ];

        Self {
            listing: chrome,
            rotation,
        }
    }

    /// Uses configured identities when present, the built-in pool otherwise
    ///
    /// The first configured identity doubles as the listing identity.
    pub fn from_profiles(profiles: &[HeaderProfile]) -> Self {
        match profiles.first() {
            Some(first) => Self {
                listing: first.clone(),
                rotation: profiles.to_vec(),
            },
            None => Self::builtin(),
        }
    }

    pub fn listing(&self) -> &HeaderProfile {
        &self.listing
    }

    /// Identity for an advertisement URL
    pub fn for_url(&self, url: &str) -> &HeaderProfile {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        let index = (hasher.finish() % self.rotation.len() as u64) as usize;
        &self.rotation[index]
    }

    pub fn len(&self) -> usize {
        self.rotation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_empty()
    }
}

/// Converts an identity to request headers; values that are not valid
/// header text are left out
pub fn header_map(profile: &HeaderProfile) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let entries = [
        (USER_AGENT, Some(profile.user_agent.as_str())),
        (ACCEPT, profile.accept.as_deref()),
        (ACCEPT_LANGUAGE, profile.accept_language.as_deref()),
        (REFERER, profile.referer.as_deref()),
    ];

    for (name, value) in entries {
        let Some(value) = value else { continue };
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => {
                tracing::warn!("Ignoring invalid {} header value", name);
            }
        }
    }

    headers
}

/// Builds an HTTP client with the configured timeouts
///
/// Identity headers are attached per request, not as client defaults.
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Stateless GET client shared by every crawler component
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    headers: HeaderPool,
}

impl HttpFetcher {
    /// Creates a fetcher from crawler settings and configured identities
    pub fn new(config: &CrawlerConfig, profiles: &[HeaderProfile]) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            headers: HeaderPool::from_profiles(profiles),
        })
    }

    /// Fetches a search listing page with the listing identity
    pub async fn fetch_listing(&self, url: &str) -> Result<RawResponse, FetchError> {
        self.fetch(url, self.headers.listing()).await
    }

    /// Fetches an advertisement page with a rotated identity
    pub async fn fetch_advert(&self, url: &str) -> Result<RawResponse, FetchError> {
        self.fetch(url, self.headers.for_url(url)).await
    }

    /// Issues one GET request
    ///
    /// # Returns
    ///
    /// * `Ok(RawResponse)` - 2xx response with its body
    /// * `Err(FetchError::HttpStatus)` - any non-2xx status
    /// * `Err(FetchError::Transport)` - DNS, connect, timeout or body read failure
    pub async fn fetch(
        &self,
        url: &str,
        profile: &HeaderProfile,
    ) -> Result<RawResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(header_map(profile))
            .send()
            .await
            .map_err(|e| classify_transport(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport(url, &e))?;

        Ok(RawResponse {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

fn classify_transport(url: &str, error: &reqwest::Error) -> FetchError {
    let kind = if error.is_timeout() {
        TransportKind::Timeout
    } else if error.is_connect() {
        TransportKind::Connect
    } else if error.is_body() || error.is_decode() {
        TransportKind::Body
    } else {
        TransportKind::Other
    };

    FetchError::Transport {
        url: url.to_string(),
        kind,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> CrawlerConfig {
        CrawlerConfig {
            base_url: "https://www.otomoto.pl/osobowe".to_string(),
            catalog_url: "https://www.otomoto.pl/ajax/jsdata/params/".to_string(),
            max_concurrency: 8,
            max_pages: 500,
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config()).is_ok());
    }

    #[test]
    fn test_builtin_pool() {
        let pool = HeaderPool::builtin();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.listing().user_agent, CHROME_MAC);
    }

    #[test]
    fn test_rotation_is_stable_per_url() {
        let pool = HeaderPool::builtin();
        let url = "https://www.otomoto.pl/oferta/audi-a4-ID6F1.html";
        assert_eq!(pool.for_url(url), pool.for_url(url));
    }

    #[test]
    fn test_configured_profiles_replace_pool() {
        let profile = HeaderProfile {
            user_agent: "TestAgent/1.0".to_string(),
            accept: None,
            accept_language: None,
            referer: None,
        };
        let pool = HeaderPool::from_profiles(&[profile.clone()]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.listing(), &profile);
        assert_eq!(pool.for_url("anything"), &profile);
    }

    #[test]
    fn test_header_map_skips_missing_and_invalid() {
        let profile = HeaderProfile {
            user_agent: "TestAgent/1.0".to_string(),
            accept: None,
            accept_language: Some("pl\nbad".to_string()),
            referer: Some(GOOGLE_REFERER.to_string()),
        };
        let headers = header_map(&profile);
        assert_eq!(headers.get(USER_AGENT).unwrap(), "TestAgent/1.0");
        assert!(headers.get(ACCEPT).is_none());
        assert!(headers.get(ACCEPT_LANGUAGE).is_none());
        assert_eq!(headers.get(REFERER).unwrap(), GOOGLE_REFERER);
    }

    #[tokio::test]
    async fn test_fetch_success_sends_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/osobowe/audi"))
            .and(header("user-agent", "TestAgent/1.0"))
            .and(header("referer", GOOGLE_REFERER))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let profile = HeaderProfile {
            user_agent: "TestAgent/1.0".to_string(),
            accept: None,
            accept_language: None,
            referer: Some(GOOGLE_REFERER.to_string()),
        };
        let fetcher = HttpFetcher::new(&create_test_config(), &[profile]).unwrap();
        let response = fetcher
            .fetch_listing(&format!("{}/osobowe/audi", server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<html></html>");
    }

    #[tokio::test]
    async fn test_fetch_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&create_test_config(), &[]).unwrap();
        let url = format!("{}/osobowe/broken-slug", server.uri());
        let err = fetcher.fetch_listing(&url).await.unwrap_err();

        match err {
            FetchError::HttpStatus { url: failed, status } => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("expected HttpStatus, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_transport_error() {
        // Bind then drop a listener to get a port with nothing behind it
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let fetcher = HttpFetcher::new(&create_test_config(), &[]).unwrap();
        let err = fetcher
            .fetch_advert(&format!("http://127.0.0.1:{}/oferta", port))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
