//! Webhook delivery.
//!
//! Each rendered message is POSTed once as `{"content": "<message>"}`. The
//! response is classified into a [`DeliveryResult`]:
//!
//! - `204 No Content` → [`DeliveryResult::Delivered`]
//! - any other status → [`DeliveryResult::Rejected`]
//! - network failure (DNS, refused connection, timeout) →
//!   [`DeliveryResult::TransportError`] with a description truncated to
//!   [`MAX_ERROR_DESCRIPTION_CHARS`] characters
//!
//! There is no retry: a failed delivery is reported and dropped.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use hookwatch_monitor::dispatcher::{DeliveryResult, WebhookDispatcher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let dispatcher = WebhookDispatcher::new(
//!         "https://discord.com/api/webhooks/123/abc".to_string(),
//!         Duration::from_secs(10),
//!     )
//!     .unwrap();
//!
//!     match dispatcher.deliver("File: a.txt").await {
//!         DeliveryResult::Delivered => println!("sent"),
//!         other => println!("not sent: {other}"),
//!     }
//! }
//! ```

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum length of a transport error description.
pub const MAX_ERROR_DESCRIPTION_CHARS: usize = 50;

/// Errors raised while constructing a dispatcher.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Timeout must be non-zero.
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// The endpoint answered `204 No Content`.
    Delivered,
    /// The endpoint answered with another status code.
    Rejected(u16),
    /// No HTTP response was obtained.
    TransportError(String),
}

impl DeliveryResult {
    /// Returns true for [`DeliveryResult::Delivered`].
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::Rejected(status) => write!(f, "rejected with status {status}"),
            Self::TransportError(description) => write!(f, "transport error: {description}"),
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts messages to a single webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    url: String,
    client: Client,
}

impl WebhookDispatcher {
    /// Creates a dispatcher for `url` with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::ZeroTimeout`] for a zero timeout and
    /// [`DispatchError::Client`] if the HTTP client cannot be initialised.
    pub fn new(url: String, timeout: Duration) -> Result<Self, DispatchError> {
        if timeout.is_zero() {
            return Err(DispatchError::ZeroTimeout);
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { url, client })
    }

    /// Sends `message` once and classifies the outcome.
    pub async fn deliver(&self, message: &str) -> DeliveryResult {
        debug!(url = %self.url, bytes = message.len(), "Posting webhook message");

        let result = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { content: message })
            .send()
            .await;

        match result {
            Ok(response) => classify_status(response.status()),
            Err(e) => {
                warn!(error = %e, "Webhook request failed");
                DeliveryResult::TransportError(truncate_description(&e.to_string()))
            }
        }
    }
}

/// Maps an HTTP status onto a delivery outcome.
fn classify_status(status: StatusCode) -> DeliveryResult {
    if status == StatusCode::NO_CONTENT {
        DeliveryResult::Delivered
    } else {
        warn!(status = status.as_u16(), "Webhook rejected message");
        DeliveryResult::Rejected(status.as_u16())
    }
}

/// Truncates to at most [`MAX_ERROR_DESCRIPTION_CHARS`] characters.
fn truncate_description(description: &str) -> String {
    description.chars().take(MAX_ERROR_DESCRIPTION_CHARS).collect()
}
