use crate::config::Config;
use crate::constants::{API_USER, COMPRESSION_COUNT_HEADER, SHRINK_PATH};
use crate::error::{Result, SlimmingError};
use crate::model::Credential;
use reqwest::header::LOCATION;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;

/// Remote compression capability used by the batch runner.
///
/// Implementations own the classification of remote failures: a rejected key
/// must come back as [`SlimmingError::Auth`], anything network or server
/// related as [`SlimmingError::Transport`], and local file problems as
/// [`SlimmingError::Io`].
pub trait CompressionService: Send {
    /// Replaces the active key. Does not touch the network.
    fn set_credential(&mut self, credential: Credential);

    /// Checks the active key with one round trip to the service.
    fn validate(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Compresses `source` remotely and writes the result to `destination`.
    fn compress_to_file(
        &mut self,
        source: &Path,
        destination: &Path,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Error body returned by the TinyPNG API.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
    message: String,
}

/// [`CompressionService`] backed by the TinyPNG HTTP API.
#[derive(Debug, Clone)]
pub struct TinifyClient {
    client: Client,
    endpoint: String,
    credential: Option<Credential>,
    compression_count: Option<u64>,
}

impl TinifyClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("img-slimming/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SlimmingError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            credential: None,
            compression_count: None,
        })
    }

    /// Compressions used this month, as last reported by the service.
    pub fn compression_count(&self) -> Option<u64> {
        self.compression_count
    }

    fn active_key(&self) -> Result<Credential> {
        self.credential
            .clone()
            .ok_or_else(|| SlimmingError::Auth("no API key has been set".to_string()))
    }

    fn shrink_url(&self) -> String {
        format!("{}{}", self.endpoint, SHRINK_PATH)
    }

    fn output_url(&self, location: &str) -> String {
        if location.starts_with('/') {
            format!("{}{}", self.endpoint, location)
        } else {
            location.to_string()
        }
    }

    fn record_compression_count(&mut self, response: &Response) {
        if let Some(count) = response
            .headers()
            .get(COMPRESSION_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
        {
            crate::verbose!("Compressions this month: {}", count);
            self.compression_count = Some(count);
        }
    }
}

impl CompressionService for TinifyClient {
    fn set_credential(&mut self, credential: Credential) {
        self.credential = Some(credential);
    }

    async fn validate(&mut self) -> Result<()> {
        let key = self.active_key()?;
        let response = self
            .client
            .post(self.shrink_url())
            .basic_auth(API_USER, Some(key.as_str()))
            .send()
            .await
            .map_err(transport_error)?;
        self.record_compression_count(&response);

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        validation_result(status, &body)
    }

    async fn compress_to_file(&mut self, source: &Path, destination: &Path) -> Result<()> {
        let key = self.active_key()?;
        let data = tokio::fs::read(source).await?;

        let response = self
            .client
            .post(self.shrink_url())
            .basic_auth(API_USER, Some(key.as_str()))
            .body(data)
            .send()
            .await
            .map_err(transport_error)?;
        self.record_compression_count(&response);

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(compression_error(status, &body));
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| self.output_url(value))
            .ok_or_else(|| {
                SlimmingError::Transport("shrink response is missing the Location header".into())
            })?;

        let output = self
            .client
            .get(&location)
            .basic_auth(API_USER, Some(key.as_str()))
            .send()
            .await
            .map_err(transport_error)?;

        let status = output.status();
        if !status.is_success() {
            let body = output.text().await.unwrap_or_default();
            return Err(compression_error(status, &body));
        }

        let bytes = output.bytes().await.map_err(transport_error)?;
        tokio::fs::write(destination, &bytes).await?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> SlimmingError {
    SlimmingError::Transport(err.to_string())
}

/// Formats a failed response as `HTTP <code>/<error>: <message>`.
fn describe_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => format!("HTTP {}/{}: {}", status.as_u16(), parsed.error, parsed.message),
        Err(_) => format!(
            "HTTP {}/{}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        ),
    }
}

/// An empty shrink request answers 400 (no input) or 429 (quota used up)
/// once the key itself has been accepted.
fn validation_result(status: StatusCode, body: &str) -> Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::BAD_REQUEST | StatusCode::TOO_MANY_REQUESTS => Ok(()),
        StatusCode::UNAUTHORIZED => Err(SlimmingError::Auth(describe_failure(status, body))),
        _ => Err(SlimmingError::Transport(describe_failure(status, body))),
    }
}

/// During compression a 400 means the service refused the request headers,
/// which only happens with a malformed key.
fn compression_error(status: StatusCode, body: &str) -> SlimmingError {
    let message = describe_failure(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::BAD_REQUEST => SlimmingError::Auth(message),
        _ => SlimmingError::Transport(message),
    }
}
