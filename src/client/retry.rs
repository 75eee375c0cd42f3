/// Retry loop for outbound API calls
///
/// A call is repeated while it produced no response at all (connection or
/// timeout failure) or the server answered with a 5xx. Client errors end the
/// loop straight away since repeating the request cannot fix them.

use reqwest::StatusCode;
use std::fmt::{self, Display};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// HTTP status class, the granularity the retry decision works at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Informational,
    Successful,
    Redirection,
    ClientError,
    ServerError,
}

impl StatusClass {
    pub fn of(status: StatusCode) -> Self {
        match status.as_u16() {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Successful,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            _ => StatusClass::ServerError,
        }
    }
}

/// Status and body of one answered request
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause after a call that got no response
    pub transport_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            transport_backoff: Duration::from_millis(10_000),
        }
    }
}

/// Result of the whole retry loop
#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    /// Class of the last status seen, `None` if nothing ever answered
    pub status: Option<StatusClass>,
    pub response: Option<RawResponse>,
    /// Body of an error response or the last transport error
    pub error: Option<String>,
    pub attempts: u32,
}

impl CallResponse {
    pub fn is_successful(&self) -> bool {
        self.status == Some(StatusClass::Successful)
    }

    /// Human readable summary for error logs
    pub fn describe(&self, method: &str, url: &str) -> String {
        DescribeCall { call: self, method, url }.to_string()
    }
}

struct DescribeCall<'a> {
    call: &'a CallResponse,
    method: &'a str,
    url: &'a str,
}

impl Display for DescribeCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} after {} attempt(s)", self.method, self.url, self.call.attempts)?;
        if let Some(status) = self.call.status {
            write!(f, ", status class {:?}", status)?;
        }
        if let Some(error) = &self.call.error {
            write!(f, ", error: {}", error)?;
        }
        Ok(())
    }
}

/// Run `call` until it succeeds, fails with a non-retryable status, or the
/// policy runs out of attempts
pub async fn call_with_retry<F, Fut, E>(policy: &RetryPolicy, mut call: F) -> CallResponse
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RawResponse, E>>,
    E: Display,
{
    let mut outcome = CallResponse {
        status: None,
        response: None,
        error: None,
        attempts: 0,
    };

    while should_retry(outcome.status) && outcome.attempts < policy.max_attempts {
        outcome.attempts += 1;

        match call().await {
            Ok(response) => {
                let class = StatusClass::of(response.status);
                debug!(attempt = outcome.attempts, status = %response.status, "External API answered");

                outcome.error = match class {
                    StatusClass::ClientError | StatusClass::ServerError => {
                        warn!(status = %response.status, "External API returned an error status");
                        Some(response.body.clone())
                    }
                    _ => None,
                };
                outcome.status = Some(class);
                outcome.response = Some(response);
            }
            Err(e) => {
                error!(attempt = outcome.attempts, error = %e, "External API call failed");
                outcome.status = None;
                outcome.response = None;
                outcome.error = Some(e.to_string());

                if outcome.attempts < policy.max_attempts {
                    sleep(policy.transport_backoff).await;
                }
            }
        }
    }

    outcome
}

fn should_retry(status: Option<StatusClass>) -> bool {
    matches!(status, None | Some(StatusClass::ServerError))
}
