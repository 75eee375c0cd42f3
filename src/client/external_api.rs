/// Generic JSON REST client for the external API
///
/// Every call goes through the retry loop in `retry`. Paths are relative to
/// the configured base URL, e.g. `shops/de` or `shops/de/11`.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument};
use url::Url;

use crate::config::{ConfigError, External};
use super::retry::{call_with_retry, CallResponse, RawResponse, RetryPolicy, StatusClass};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid [external] settings: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid header {0}")]
    Header(String),

    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Request body could not be encoded: {0}")]
    Encode(serde_json::Error),

    #[error("Response from {url} could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("External API call failed: {0}")]
    Call(String),
}

/// A collection item together with its hypermedia links
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Resource<T> {
    #[serde(flatten)]
    pub content: T,
    #[serde(rename = "_links", default)]
    pub links: Option<Value>,
}

pub struct ExternalApiClient {
    http: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ExternalApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalApiClient")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ExternalApiClient {
    pub fn new(settings: &External) -> Result<Self, ApiError> {
        settings.validate()?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .timeout(Duration::from_millis(settings.read_timeout_ms))
            .default_headers(default_headers(settings)?)
            .build()?;

        info!("🌐 External API client ready for {}", settings.base_url);

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            policy: RetryPolicy {
                max_attempts: settings.retry_attempts,
                transport_backoff: Duration::from_millis(settings.read_timeout_ms),
            },
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Absolute URL for a path relative to the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|source| ApiError::Url { url: raw, source })
    }

    /// POST `body`; returns the created object, `None` when the API sends no body
    pub async fn create<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(ApiError::Encode)?;
        self.call_for_object(Method::POST, path, Some(body)).await
    }

    /// GET a collection; empty when the API sends no body
    pub async fn retrieve<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let url = self.endpoint(path)?;
        match self.call(Method::GET, url.clone(), None).await? {
            Some(text) => decode_collection(&text).map_err(|source| ApiError::Decode {
                url: url.to_string(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }

    /// GET a collection keeping each item's links
    pub async fn retrieve_resources<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<Resource<T>>, ApiError> {
        self.retrieve(path).await
    }

    /// PUT `body`; returns the updated object, `None` when the API sends no body
    pub async fn update<B, T>(&self, path: &str, body: &B) -> Result<Option<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(ApiError::Encode)?;
        self.call_for_object(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.endpoint(path)?;
        self.call(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn call_for_object<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<T>, ApiError> {
        let url = self.endpoint(path)?;
        match self.call(method, url.clone(), body).await? {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|source| ApiError::Decode {
                    url: url.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Run one request through the retry loop; returns the successful body,
    /// `None` if it was empty
    #[instrument(skip(self, url, body), fields(method = %method, url = %url))]
    async fn call(&self, method: Method, url: Url, body: Option<Value>) -> Result<Option<String>, ApiError> {
        info!("Calling External API at [{}]", url);

        let outcome = call_with_retry(&self.policy, || {
            let mut request = self.http.request(method.clone(), url.clone());
            if let Some(body) = &body {
                request = request.json(body);
            }
            async move {
                let response = request.send().await?;
                let status = response.status();
                let body = response.text().await?;
                Ok::<_, reqwest::Error>(RawResponse { status, body })
            }
        })
        .await;

        if let Some(response) = &outcome.response {
            info!(
                "External API call response status is [{} - {}]",
                response.status.as_u16(),
                response.status.canonical_reason().unwrap_or("unknown")
            );
        }

        successful_body(outcome, method.as_str(), url.as_str())
    }
}

fn default_headers(settings: &External) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(key) = &settings.oauth_consumer_key {
        headers.insert(AUTHORIZATION, HeaderValue::from_static("OAuth"));
        headers.insert(HeaderName::from_static("oauth_version"), HeaderValue::from_static("1.0"));
        headers.insert(
            HeaderName::from_static("oauth_signature_method"),
            HeaderValue::from_static("HMAC-SHA1"),
        );
        headers.insert(HeaderName::from_static("oauth_consumer_key"), header_value(key)?);
    }
    if let Some(signature) = &settings.oauth_signature {
        headers.insert(HeaderName::from_static("oauth_signature"), header_value(signature)?);
    }

    Ok(headers)
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value).map_err(|_| ApiError::Header(value.to_string()))
}

fn successful_body(outcome: CallResponse, method: &str, url: &str) -> Result<Option<String>, ApiError> {
    if outcome.status != Some(StatusClass::Successful) {
        let description = outcome.describe(method, url);
        error!("Couldn't call External API: {}", description);
        return Err(ApiError::Call(description));
    }

    match outcome.response {
        Some(response) if !response.body.trim().is_empty() => Ok(Some(response.body)),
        _ => {
            info!("External API call returned no results for URL [{}]", url);
            Ok(None)
        }
    }
}

/// Accepts a bare JSON array, a HAL document with the collection under
/// `_embedded`, or a `content` array
pub fn decode_collection<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;

    let items = match value {
        Value::Array(_) => value,
        Value::Object(mut object) => {
            let embedded = object
                .remove("_embedded")
                .and_then(|embedded| match embedded {
                    Value::Object(map) => map.into_iter().map(|(_, v)| v).find(Value::is_array),
                    _ => None,
                });
            match embedded.or_else(|| object.remove("content").filter(Value::is_array)) {
                Some(items) => items,
                None => return Ok(Vec::new()),
            }
        }
        _ => return Ok(Vec::new()),
    };

    serde_json::from_value(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Shop {
        id: u32,
        name: String,
    }

    fn settings(base_url: &str) -> External {
        External {
            base_url: base_url.to_string(),
            ..External::default()
        }
    }

    #[test]
    fn test_endpoint_join() {
        let client = ExternalApiClient::new(&settings("https://api.example.com/v2/")).unwrap();
        assert_eq!(
            client.endpoint("shops/de").unwrap().as_str(),
            "https://api.example.com/v2/shops/de"
        );
        assert_eq!(
            client.endpoint("/shops/de/11").unwrap().as_str(),
            "https://api.example.com/v2/shops/de/11"
        );
    }

    #[test]
    fn test_unusable_settings_are_rejected() {
        let err = ExternalApiClient::new(&settings("shops")).unwrap_err();
        assert!(matches!(err, ApiError::Config(ConfigError::InvalidValue { .. })));

        let mut external = settings("http://localhost");
        external.retry_attempts = 0;
        assert!(matches!(ExternalApiClient::new(&external), Err(ApiError::Config(_))));
    }

    #[test]
    fn test_oauth_headers() {
        let mut external = settings("http://localhost");
        external.oauth_consumer_key = Some("consumer".to_string());
        external.oauth_signature = Some("sig".to_string());

        let headers = default_headers(&external).unwrap();
        assert_eq!(headers["oauth_consumer_key"], "consumer");
        assert_eq!(headers["oauth_signature"], "sig");
        assert_eq!(headers[AUTHORIZATION], "OAuth");

        let headers = default_headers(&settings("http://localhost")).unwrap();
        assert!(!headers.contains_key("oauth_consumer_key"));
    }

    #[test]
    fn test_invalid_header_value() {
        let mut external = settings("http://localhost");
        external.oauth_signature = Some("bad\nvalue".to_string());
        assert!(matches!(default_headers(&external), Err(ApiError::Header(_))));
    }

    #[test]
    fn test_decode_plain_array() {
        let shops: Vec<Shop> = decode_collection(r#"[{"id": 1, "name": "a"}]"#).unwrap();
        assert_eq!(shops, vec![Shop { id: 1, name: "a".to_string() }]);
    }

    #[test]
    fn test_decode_hal_collection() {
        let body = r#"{
            "_embedded": {"shops": [{"id": 1, "name": "a", "_links": {"self": {"href": "/shops/1"}}}]},
            "_links": {"self": {"href": "/shops"}}
        }"#;
        let shops: Vec<Shop> = decode_collection(body).unwrap();
        assert_eq!(shops.len(), 1);

        let resources: Vec<Resource<Shop>> = decode_collection(body).unwrap();
        assert_eq!(resources[0].content.name, "a");
        assert_eq!(resources[0].links.as_ref().unwrap()["self"]["href"], "/shops/1");
    }

    #[test]
    fn test_decode_without_collection_is_empty() {
        let shops: Vec<Shop> = decode_collection(r#"{"_links": {}}"#).unwrap();
        assert!(shops.is_empty());
        let shops: Vec<Shop> = decode_collection(r#"{"content": [{"id": 2, "name": "b"}]}"#).unwrap();
        assert_eq!(shops[0].id, 2);
    }

    #[test]
    fn test_successful_body() {
        let outcome = CallResponse {
            status: Some(StatusClass::Successful),
            response: Some(RawResponse {
                status: StatusCode::OK,
                body: "{}".to_string(),
            }),
            error: None,
            attempts: 1,
        };
        assert_eq!(successful_body(outcome, "GET", "u").unwrap().as_deref(), Some("{}"));

        let empty = CallResponse {
            status: Some(StatusClass::Successful),
            response: Some(RawResponse {
                status: StatusCode::NO_CONTENT,
                body: String::new(),
            }),
            error: None,
            attempts: 1,
        };
        assert_eq!(successful_body(empty, "DELETE", "u").unwrap(), None);

        let failed = CallResponse {
            status: Some(StatusClass::ClientError),
            response: None,
            error: Some("nope".to_string()),
            attempts: 1,
        };
        assert!(matches!(successful_body(failed, "GET", "u"), Err(ApiError::Call(_))));
    }
}
