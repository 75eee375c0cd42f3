/// Outbound REST client used by features outside the statistics window

pub mod external_api;
pub mod retry;

pub use external_api::{ApiError, ExternalApiClient, Resource};
pub use retry::{call_with_retry, CallResponse, RawResponse, RetryPolicy, StatusClass};
