// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Authenticated HTTP client wrapping reqwest.
//!
//! Not a browser, just cookie-authenticated GETs. Handles redirects,
//! timeouts, retry on 5xx, and backoff on 429.

use crate::config::ExportConfig;
use crate::error::ExportResult;
use crate::session::Credential;
use std::time::Duration;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Original requested URL.
    pub url: String,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client shared by verification and structured discovery.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpClient {
    pub fn new(config: &ExportConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent.as_str())
            .build()
            .unwrap_or_default();

        Self {
            client,
            max_retries: config.http_retries,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Override the first retry delay (doubles on each further retry).
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// GET with the session cookie attached.
    ///
    /// Retries transport errors and 5xx responses with exponential backoff
    /// and honours `Retry-After` (capped at 10s) on 429. Whatever status
    /// remains after retries is returned as-is; only transport failures are
    /// errors.
    pub async fn get(
        &self,
        url: &str,
        credential: &Credential,
        accept: Option<&str>,
        timeout_ms: u64,
    ) -> ExportResult<HttpResponse> {
        let mut retries = 0u32;

        loop {
            let mut builder = self
                .client
                .get(url)
                .timeout(Duration::from_millis(timeout_ms))
                .header(reqwest::header::COOKIE, credential.header_value());
            if let Some(accept) = accept {
                builder = builder.header(reqwest::header::ACCEPT, accept);
            }

            match builder.send().await {
                Ok(r) => {
                    let status = r.status().as_u16();
                    let final_url = r.url().to_string();

                    if status >= 500 && retries < self.max_retries {
                        retries += 1;
                        tracing::debug!(status, retries, "retrying after server error");
                        tokio::time::sleep(self.backoff(retries)).await;
                        continue;
                    }

                    if status == 429 && retries < self.max_retries {
                        retries += 1;
                        let retry_after = r
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(2);
                        tokio::time::sleep(Duration::from_secs(retry_after.min(10))).await;
                        continue;
                    }

                    let body = r.text().await.unwrap_or_default();

                    return Ok(HttpResponse {
                        url: url.to_string(),
                        final_url,
                        status,
                        body,
                    });
                }
                Err(e) => {
                    if retries < self.max_retries {
                        retries += 1;
                        tracing::debug!(retries, "retrying after transport error");
                        tokio::time::sleep(self.backoff(retries)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
    }

    fn backoff(&self, retries: u32) -> Duration {
        self.base_delay * 2u32.pow(retries.saturating_sub(1))
    }
}
