use crate::api::backoff::{RetryPolicy, SharedSleeper};
use crate::api::proxy::ProxyLease;
use crate::config;
use crate::error::{AppError, AppResult, ImportError, TransportKind};
use crate::logging::{log, LogLevel};
use crate::model::job::ApiKey;
use bytes::Bytes;
use reqwest::{Client, Proxy, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// One HTTP session for a fetch phase. Cloning shares the underlying
/// connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: ApiKey,
    policy: RetryPolicy,
    request_timeout: Duration,
    sleeper: SharedSleeper,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: &ApiKey,
        lease: Option<&ProxyLease>,
        sleeper: SharedSleeper,
    ) -> AppResult<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_secs(config::HTTP_CONNECT_TIMEOUT));
        if let Some(lease) = lease {
            builder = builder.proxy(Proxy::all(lease.url()).map_err(AppError::from)?);
        }
        let client = builder.build().map_err(AppError::from)?;
        Ok(ApiClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.clone(),
            policy: RetryPolicy::default(),
            request_timeout: Duration::from_secs(config::HTTP_TIMEOUT_SECONDS),
            sleeper,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Overall deadline for a single attempt; an attempt that runs past it
    /// counts as a transport failure and is retried.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn fetch_json<T>(&self, url: &str, query: &[(&str, String)]) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let body = self.execute(url, query).await?;

        serde_json::from_str(&body).map_err(|e| {
            let snippet: String = body.chars().take(200).collect();
            log(
                LogLevel::Error,
                &format!(
                    "Fail parse response for {} Type {}: {}. Snippet: '{}'",
                    url,
                    std::any::type_name::<T>(),
                    e,
                    snippet
                ),
            );
            AppError::response_invalid(e.to_string(), url)
        })
    }

    /// GET `url` and return the body of a 200 response. 429/504 and transport
    /// failures are retried with exponential backoff; anything else, or an
    /// exhausted retry budget, is a terminal `ImportError`.
    pub async fn execute(&self, url: &str, query: &[(&str, String)]) -> AppResult<String> {
        let url_tag = url
            .trim_start_matches(&self.base_url)
            .trim_start_matches('/');
        let mut attempt: u32 = 0;

        loop {
            let log_prefix = format!("API Req GET {} (Try {})", url_tag, attempt + 1);

            let request = self
                .client
                .get(url)
                .query(query)
                .timeout(self.request_timeout)
                .basic_auth(config::API_USERNAME, Some(self.api_key.as_str()));

            let failure = match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::OK {
                        match resp.bytes().await {
                            Ok(bytes) => return decode_body(bytes, url),
                            Err(e) => {
                                let kind = TransportKind::classify(&e);
                                log(
                                    LogLevel::Warning,
                                    &format!("{} - {} reading response body: {}", log_prefix, kind, e),
                                );
                                ImportError::transport(url, self.api_key.as_str(), kind)
                            }
                        }
                    } else {
                        let reason = status.canonical_reason().unwrap_or("Unknown Status");
                        let error = ImportError::remote_status(
                            url,
                            self.api_key.as_str(),
                            status.as_u16(),
                            reason,
                        );
                        if !RetryPolicy::is_retryable_status(status.as_u16()) {
                            log(
                                LogLevel::Error,
                                &format!(
                                    "{} - Received invalid response code: {} ({}). Not retrying.",
                                    log_prefix,
                                    status.as_u16(),
                                    reason
                                ),
                            );
                            return Err(error.into());
                        }
                        log(
                            LogLevel::Warning,
                            &format!(
                                "{} - Retryable response code: {} ({})",
                                log_prefix,
                                status.as_u16(),
                                reason
                            ),
                        );
                        error
                    }
                }
                Err(e) => {
                    let kind = TransportKind::classify(&e);
                    log(
                        LogLevel::Warning,
                        &format!("{} - {}: {}", log_prefix, kind, e),
                    );
                    ImportError::transport(url, self.api_key.as_str(), kind)
                }
            };

            if !self.policy.can_retry(attempt) {
                log(
                    LogLevel::Error,
                    &format!(
                        "{} - Giving up after {} retries: {}",
                        log_prefix, self.policy.max_retries, failure
                    ),
                );
                return Err(failure.into());
            }

            let delay = self.policy.delay(attempt);
            log(
                LogLevel::Warning,
                &format!("{} - Retrying in {}s", log_prefix, delay.as_secs()),
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

fn decode_body(bytes: Bytes, url: &str) -> AppResult<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| AppError::response_invalid(format!("Body is not UTF-8: {}", e), url))
}
