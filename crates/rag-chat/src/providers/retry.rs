//! Retrying JSON client shared by the hosted API providers

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Failure of a single HTTP attempt
#[derive(Debug)]
pub(crate) struct AttemptError {
    pub message: String,
    /// Transport errors, 429 and 5xx are worth another try
    pub retryable: bool,
}

impl AttemptError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, detail: String) -> Self {
        let message = format!("API returned {}: {}", status, detail);
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::retryable(message)
        } else {
            Self::fatal(message)
        }
    }
}

/// Run `operation` up to `max_retries + 1` times, sleeping 1s, 2s, 4s... between attempts
pub(crate) async fn retry_request<F, Fut, T>(
    provider: &str,
    max_retries: u32,
    operation: F,
) -> std::result::Result<T, AttemptError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.retryable && attempt < max_retries => {
                let delay = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    provider,
                    error = %e.message,
                    "Request failed (attempt {}/{}), retrying in {:?}",
                    attempt + 1,
                    max_retries + 1,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pulls the human-readable message out of a provider's error body
pub(crate) type ErrorDetail = fn(&str) -> Option<String>;

/// Bearer-authenticated JSON POSTs against one hosted API
pub(crate) struct JsonClient {
    provider: &'static str,
    client: Client,
    api_key: Option<String>,
    key_var: &'static str,
    base_url: String,
    max_retries: u32,
    error_detail: ErrorDetail,
}

impl JsonClient {
    pub fn new(
        provider: &'static str,
        key_var: &'static str,
        api_key: Option<String>,
        base_url: &str,
        max_retries: u32,
        error_detail: ErrorDetail,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            client,
            api_key,
            key_var,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            error_detail,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    /// POST `body` to `path`, retrying transport errors, 429 and 5xx
    pub async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        timeout: Duration,
    ) -> std::result::Result<Resp, AttemptError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();
        retry_request(self.provider, self.max_retries, || async move {
            let api_key = self.api_key.as_deref().ok_or_else(|| {
                AttemptError::fatal(format!("{} environment variable not set", self.key_var))
            })?;
            let response = self
                .client
                .post(url)
                .bearer_auth(api_key)
                .timeout(timeout)
                .json(body)
                .send()
                .await
                .map_err(|e| AttemptError::retryable(format!("request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(AttemptError::from_status(status, describe(&text, self.error_detail)));
            }

            response
                .json::<Resp>()
                .await
                .map_err(|e| AttemptError::fatal(format!("failed to parse response: {}", e)))
        })
        .await
    }
}

/// Provider message when the body has one, else the raw body
fn describe(body: &str, error_detail: ErrorDetail) -> String {
    error_detail(body).unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn message_field(body: &str) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()?
            .get("message")?
            .as_str()
            .map(str::to_string)
    }

    #[test]
    fn test_error_body_falls_back_to_raw_text() {
        assert_eq!(describe(r#"{"message":"invalid api token"}"#, message_field), "invalid api token");
        assert_eq!(describe("upstream timeout", message_field), "upstream timeout");
        assert_eq!(describe("", message_field), "");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_retry() {
        let client = JsonClient::new("test", "TEST_API_KEY", None, "http://127.0.0.1:9/", 3, message_field).unwrap();
        assert!(!client.has_credentials());
        let err = client
            .post_json::<_, serde_json::Value>("/embed", &serde_json::json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(!err.retryable);
        assert_eq!(err.message, "TEST_API_KEY environment variable not set");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_request("test", 2, || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AttemptError::retryable("503"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: std::result::Result<(), _> = retry_request("test", 3, || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AttemptError::fatal("401"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
