//! HTTP fetcher for api mode.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, COOKIE, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::cookies::{cookie_header, load_cookies};
use super::{Page, PageFetcher};
use crate::config::SpiderConfig;
use crate::error::FetchError;
use crate::extract::json::value_to_string;

/// User agent sent when the config does not name one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("accept", "application/json, text/plain, */*"),
    ("accept-language", "zh-CN,zh;q=0.9,en;q=0.8"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    ("x-requested-with", "fetch"),
];

/// Plain HTTP fetcher with retries.
///
/// Holds the last successfully fetched page so `content` can be read after
/// `navigate`, the same way a browser page is.
pub struct HttpFetcher {
    client: Client,
    retry_times: u32,
    retry_delay: Duration,
    timeout_secs: u64,
    expect_json: bool,
    current: Option<(String, Page)>,
}

impl HttpFetcher {
    pub fn from_config(config: &SpiderConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .default_headers(build_headers(config))
            .timeout(config.timeout_duration())
            .gzip(true)
            .brotli(true);

        if let Some(ref proxy) = config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            retry_times: config.retry_times.max(1),
            retry_delay: config.delay_duration(),
            timeout_secs: config.timeout,
            expect_json: true,
            current: None,
        })
    }

    /// Return response bodies as markup instead of decoding JSON.
    pub fn markup_only(mut self) -> Self {
        self.expect_json = false;
        self
    }

    async fn request(&self, url: &str) -> Result<Page, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Response from {}: {} bytes", url, body.len());

        if !self.expect_json {
            return Ok(Page::Html(body));
        }

        let data: Value = serde_json::from_str(&body).map_err(|e| FetchError::Parse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        check_api_error(url, &data)?;
        Ok(Page::Json(data))
    }
}

fn build_headers(config: &SpiderConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    insert_header(&mut headers, USER_AGENT.as_str(), user_agent);

    for (name, value) in DEFAULT_HEADERS {
        insert_header(&mut headers, name, value);
    }
    for (name, value) in &config.headers {
        insert_header(&mut headers, name, value);
    }

    if let Some(ref path) = config.cookies_file {
        let cookies = load_cookies(path);
        if !cookies.is_empty() {
            insert_header(&mut headers, COOKIE.as_str(), &cookie_header(&cookies));
        }
    }

    if !headers.contains_key(ACCEPT) {
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    }
    headers
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => warn!("Ignoring invalid header {:?}", name),
    }
}

/// Reject bodies that report an application-level error.
///
/// A top-level `error` key, or a `code` other than 200, counts as a failure.
pub fn check_api_error(url: &str, data: &Value) -> Result<(), FetchError> {
    let Some(obj) = data.as_object() else {
        return Ok(());
    };

    if let Some(error) = obj.get("error") {
        return Err(FetchError::Api {
            url: url.to_string(),
            message: value_to_string(error),
        });
    }

    if let Some(code) = obj.get("code") {
        if code.as_i64() != Some(200) {
            let message = obj.get("message").map(value_to_string).unwrap_or_default();
            return Err(FetchError::Api {
                url: url.to_string(),
                message: format!("code {}: {}", value_to_string(code), message),
            });
        }
    }

    Ok(())
}

fn is_retryable(error: &FetchError) -> bool {
    matches!(
        error,
        FetchError::Http(_) | FetchError::Timeout { .. } | FetchError::Status { .. }
    )
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError> {
        self.current = None;
        let mut attempt = 1;
        loop {
            info!("GET {} (attempt {}/{})", url, attempt, self.retry_times);
            match self.request(url).await {
                Ok(page) => {
                    self.current = Some((url.to_string(), page));
                    return Ok(());
                }
                Err(e) if attempt < self.retry_times && is_retryable(&e) => {
                    warn!("Request to {} failed: {}, retrying", url, e);
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn content(&mut self) -> Result<Page, FetchError> {
        match self.current {
            Some((_, ref page)) => Ok(page.clone()),
            None => Err(FetchError::Parse {
                url: String::new(),
                reason: "no page loaded".to_string(),
            }),
        }
    }
}
