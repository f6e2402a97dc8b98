// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP delivery to the InfluxDB v2 write API.
//!
//! One synchronous `POST <url>/api/v2/write?org=<org>&bucket=<bucket>` per
//! batch, body sent as-is. Outcomes are classified so callers can report a
//! timeout differently from a rejected write or a broken connection.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use log::debug;
use reqwest::blocking::Client;
use reqwest::header::{
    HeaderMap, HeaderValue, InvalidHeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE,
};
use reqwest::redirect::Policy;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Destination;

/// Write API path appended to the destination url.
pub const WRITE_PATH: &str = "/api/v2/write";

/// Scheme assumed when the configured url has none.
pub const DEFAULT_SCHEME: &str = "https";

/// Default connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default total request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_REDIRECTS: usize = 10;

/// Errors that end a delivery attempt.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The destination has no url.
    #[error("destination has no url")]
    MissingUrl,
    /// The destination has no bucket.
    #[error("destination has no bucket")]
    MissingBucket,
    /// The write endpoint could not be composed from the url.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The token cannot be sent as a header value.
    #[error("invalid authorization token: {0}")]
    InvalidToken(#[source] InvalidHeaderValue),
    /// The HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// Connecting or the whole request took longer than allowed.
    #[error("operation timed out")]
    TimedOut,
    /// InfluxDB answered with a non-success status.
    #[error("write rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    /// Any other transport or protocol failure.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl DeliveryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeliveryError::TimedOut)
    }

    /// Whether the request never left the process.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            DeliveryError::MissingUrl
                | DeliveryError::MissingBucket
                | DeliveryError::InvalidUrl { .. }
                | DeliveryError::InvalidToken(_)
                | DeliveryError::Client(_)
        )
    }
}

/// Sends encoded payloads to a destination.
pub trait Transport: Send + Sync {
    /// Deliver `body` to `destination`.
    fn write(&self, destination: &Destination, body: Vec<u8>) -> Result<(), DeliveryError>;
}

/// Compose the write endpoint for `destination`.
///
/// `https` is assumed when the url carries no scheme. Query parameters are
/// percent-encoded; an absent org is sent empty.
pub fn write_endpoint(destination: &Destination) -> Result<Url, DeliveryError> {
    let base = destination.url.as_deref().ok_or(DeliveryError::MissingUrl)?;
    let bucket = destination
        .bucket
        .as_deref()
        .ok_or(DeliveryError::MissingBucket)?;

    let trimmed = base.trim_end_matches('/');
    let raw = if trimmed.contains("://") {
        format!("{trimmed}{WRITE_PATH}")
    } else {
        format!("{DEFAULT_SCHEME}://{trimmed}{WRITE_PATH}")
    };

    let mut url = Url::parse(&raw).map_err(|e| DeliveryError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(DeliveryError::InvalidUrl {
            url: base.to_string(),
            reason: "url has no host".to_string(),
        });
    }

    url.query_pairs_mut()
        .append_pair("org", destination.org.as_deref().unwrap_or_default())
        .append_pair("bucket", bucket);
    Ok(url)
}

/// Headers sent with every write.
///
/// `Authorization` is only present when a token is configured.
pub fn write_headers(token: Option<&str>) -> Result<HeaderMap, DeliveryError> {
    let mut headers = HeaderMap::with_capacity(3);
    if let Some(token) = token {
        let mut value =
            HeaderValue::from_str(&format!("Token {token}")).map_err(DeliveryError::InvalidToken)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// Check that a write request can be built for `destination`.
pub(crate) fn validate(destination: &Destination) -> Result<(), DeliveryError> {
    write_endpoint(destination)?;
    write_headers(destination.token.as_deref())?;
    Ok(())
}

/// Blocking HTTP transport sharing one pooled client across all writes.
///
/// The client is created on the first write, not at construction: the host
/// forks its worker processes after loading the module, and the client's
/// background thread does not survive a fork.
#[derive(Debug)]
pub struct HttpWriter {
    connect_timeout: Duration,
    timeout: Duration,
    client: Mutex<Option<Client>>,
}

impl HttpWriter {
    /// Writer with the default 10 second connect and total timeouts.
    pub fn new() -> Self {
        Self::with_timeouts(CONNECT_TIMEOUT, REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(connect_timeout: Duration, timeout: Duration) -> Self {
        Self {
            connect_timeout,
            timeout,
            client: Mutex::new(None),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn client(&self) -> Result<Client, DeliveryError> {
        let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(DeliveryError::Client)?;
        debug!(
            "Created HTTP client (connect timeout {:?}, timeout {:?})",
            self.connect_timeout, self.timeout
        );
        *slot = Some(client.clone());
        Ok(client)
    }
}

impl Default for HttpWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpWriter {
    fn write(&self, destination: &Destination, body: Vec<u8>) -> Result<(), DeliveryError> {
        let endpoint = write_endpoint(destination)?;
        let headers = write_headers(destination.token.as_deref())?;
        let client = self.client()?;

        debug!("POST {} ({} bytes)", endpoint, body.len());
        let response = client
            .post(endpoint)
            .headers(headers)
            .body(body)
            .send()
            .map_err(classify)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.bytes().unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            message: error_message(&String::from_utf8_lossy(&body)),
        })
    }
}

fn classify(e: reqwest::Error) -> DeliveryError {
    if e.is_timeout() {
        debug!("Request timed out: {}", e);
        DeliveryError::TimedOut
    } else {
        DeliveryError::Transport(e)
    }
}

/// InfluxDB v2 error body.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Human-readable reason from an error response body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(ApiError {
            code: Some(code),
            message,
        }) => format!("{code}: {message}"),
        Ok(ApiError { message, .. }) => message,
        Err(_) => body.trim().to_string(),
    }
}
