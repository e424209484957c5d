//! # Downloader
//!
//! The one HTTP client plugins share. Every request starts from a fixed set
//! of browser-like default headers, then applies (in this order, later wins):
//!
//! 1. the engine-wide `user_agent` override, if configured
//! 2. headers carried by a pre-built [`FetchRequest`]
//! 3. the `extra_headers` passed to [`Downloader::fetch`]
//!
//! Requests are synchronous and bounded by the configured timeout. There is
//! no retry here; a plugin that wants one wraps `fetch` itself.
//!
//! The underlying `reqwest` client is built on first use and shared by every
//! clone of a [`Downloader`], so keep-alive connections are reused across
//! cycles.
//!
//! ```no_run
//! use nowplaying::downloader::Downloader;
//!
//! let downloader = Downloader::default();
//! let page = downloader.fetch("https://example.com/", &[("Accept-Language", "en")])?;
//! println!("{} bytes", page.len());
//! # Ok::<(), nowplaying::error::NetworkError>(())
//! ```

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::Method;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::error::NetworkError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Headers every request starts from.
pub const DEFAULT_HEADERS: [(&str, &str); 4] = [
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "ru,en-US;q=0.7,en;q=0.3"),
    ("Connection", "keep-alive"),
    ("User-Agent", DEFAULT_USER_AGENT),
];

/// A request descriptor for callers that need more than a plain GET.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: Method::POST,
            body: Some(body.into()),
            ..Self::get(url)
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl From<&str> for FetchRequest {
    fn from(url: &str) -> Self {
        Self::get(url)
    }
}

impl From<String> for FetchRequest {
    fn from(url: String) -> Self {
        Self::get(url)
    }
}

/// Shared outbound HTTP capability.
#[derive(Debug, Clone)]
pub struct Downloader {
    timeout: Duration,
    user_agent: Option<String>,
    client: Arc<Mutex<Option<Client>>>,
}

impl Downloader {
    pub fn new(timeout: Duration, user_agent: Option<String>) -> Self {
        Self {
            timeout,
            user_agent,
            client: Arc::new(Mutex::new(None)),
        }
    }

    /// The pooled client, built on first use.
    fn client(&self) -> Result<Client, NetworkError> {
        let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(NetworkError::Client)?;
        *slot = Some(client.clone());
        Ok(client)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Fetch `target` and return the response body.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::Timeout`] if the request does not finish in time
    /// - [`NetworkError::Transport`] on connection or protocol failures
    /// - [`NetworkError::Status`] for non-2xx responses
    /// - [`NetworkError::InvalidHeader`] for malformed header names/values
    pub fn fetch(
        &self,
        target: impl Into<FetchRequest>,
        extra_headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, NetworkError> {
        let request = target.into();
        let headers = self.build_headers(&request, extra_headers)?;
        let url = request.url;

        let timeout_secs = self.timeout.as_secs_f64();
        debug!("Fetching {} {url} (timeout {timeout_secs:.1}s)", request.method);

        let client = self.client()?;
        let mut builder = client.request(request.method, &url).headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().map_err(|e| classify(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(|e| classify(&url, e))?;
        debug!("Fetched {} bytes from {url}", body.len());
        Ok(body.to_vec())
    }

    /// The headers a request for `request` would carry.
    pub fn build_headers(
        &self,
        request: &FetchRequest,
        extra_headers: &[(&str, &str)],
    ) -> Result<HeaderMap, NetworkError> {
        let mut headers = HeaderMap::new();

        for (name, value) in DEFAULT_HEADERS {
            insert_header(&mut headers, name, value)?;
        }
        if let Some(user_agent) = &self.user_agent {
            let value = HeaderValue::from_str(user_agent).map_err(|_| NetworkError::InvalidHeader {
                name: USER_AGENT.to_string(),
            })?;
            headers.insert(USER_AGENT, value);
        }
        for (name, value) in &request.headers {
            insert_header(&mut headers, name, value)?;
        }
        for (name, value) in extra_headers {
            insert_header(&mut headers, name, value)?;
        }

        Ok(headers)
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, None)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), NetworkError> {
    let invalid = || NetworkError::InvalidHeader {
        name: name.to_string(),
    };
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    headers.insert(name, value);
    Ok(())
}

fn classify(url: &str, error: reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
    } else {
        NetworkError::Transport {
            url: url.to_string(),
            source: error,
        }
    }
}
