//! Blocking HTTP client for the Ergast-compatible API.

use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::error::{Error, FetchError, Result};
use crate::parse::Resource;

const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            max_backoff: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based): `base * 2^retry`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.backoff_base
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Source of raw season documents.
pub trait Fetch {
    fn fetch(&self, year: i32, resource: Resource) -> Result<Value>;
}

pub struct ErgastClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ErgastClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|err| Error::Fetch {
                url: config.base_url.clone(),
                source: FetchError::Transport(err),
            })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{segments...}/`, empty segments skipped. The API requires the
    /// trailing slash.
    pub fn url_for(&self, segments: &[&str]) -> String {
        let path = segments
            .iter()
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        if path.is_empty() {
            format!("{}/", self.base_url)
        } else {
            format!("{}/{path}/", self.base_url)
        }
    }

    pub fn get(&self, segments: &[&str]) -> Result<Value> {
        self.get_with_params(segments, &[])
    }

    pub fn get_with_params(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Value> {
        let url = self.url_for(segments);
        let fail = |source: FetchError| Error::Fetch {
            url: url.clone(),
            source,
        };

        let mut retry = 0u32;
        loop {
            debug!(url = %url, attempt = retry + 1, "GET");
            let mut req = self.http.get(&url);
            if !params.is_empty() {
                req = req.query(params);
            }

            match req.send() {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.text().map_err(|err| fail(err.into()))?;
                    return serde_json::from_str(&body).map_err(|err| fail(err.into()));
                }
                Ok(resp) => {
                    let status = resp.status();
                    if RetryPolicy::is_retryable_status(status.as_u16())
                        && retry < self.retry.max_retries
                    {
                        let delay = retry_after(resp.headers())
                            .map(|d| d.min(self.retry.max_backoff))
                            .unwrap_or_else(|| self.retry.backoff(retry));
                        warn!(url = %url, status = status.as_u16(), retry = retry + 1, delay_ms = delay.as_millis() as u64, "retrying after status");
                        thread::sleep(delay);
                        retry += 1;
                        continue;
                    }
                    return Err(fail(status_error(status, resp)));
                }
                Err(err) if is_transient(&err) && retry < self.retry.max_retries => {
                    let delay = self.retry.backoff(retry);
                    warn!(url = %url, error = %err, retry = retry + 1, delay_ms = delay.as_millis() as u64, "retrying after transport error");
                    thread::sleep(delay);
                    retry += 1;
                }
                Err(err) => return Err(fail(err.into())),
            }
        }
    }
}

impl Fetch for ErgastClient {
    fn fetch(&self, year: i32, resource: Resource) -> Result<Value> {
        let year = year.to_string();
        self.get(&[&year, resource.path_segment()])
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn status_error(status: StatusCode, resp: Response) -> FetchError {
    let body = resp.text().unwrap_or_default();
    FetchError::Status {
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    }
}
