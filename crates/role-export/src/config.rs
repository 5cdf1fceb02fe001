// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration.
//!
//! Defaults match the timings the export flow needs on a typical tenant.
//! `ROLE_EXPORT_*` environment variables override individual fields; the
//! CLI overrides those in turn.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Display names excluded from every run unless the caller says otherwise.
pub const DEFAULT_EXCLUDED_ROLES: &[&str] = &["D2LMonitor"];

/// Tunables for one export run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Bound on each page load.
    pub navigation_timeout_ms: u64,
    /// Bound on waiting for the Export control to appear.
    pub control_timeout_ms: u64,
    /// Bound on waiting for the exported file.
    pub download_timeout_ms: u64,
    /// Bound on each discovery HTTP request.
    pub request_timeout_ms: u64,
    /// Bound on the credential probe.
    pub verify_timeout_ms: u64,
    /// Extraction attempts per role, including the first.
    pub max_attempts: u32,
    /// Pause between extraction attempts.
    pub retry_backoff_ms: u64,
    /// Retries on 5xx/429 inside the HTTP client.
    pub http_retries: u32,
    /// LMS API version used in endpoint paths.
    pub api_version: String,
    /// Pagination bound for the markup discovery strategy.
    pub max_scrape_pages: usize,
    /// Navigate to the direct export page when the Export control is absent.
    pub direct_export_fallback: bool,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Explicit browser binary; located automatically when unset.
    pub chromium_path: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 45_000,
            control_timeout_ms: 8_000,
            download_timeout_ms: 30_000,
            request_timeout_ms: 30_000,
            verify_timeout_ms: 15_000,
            max_attempts: 3,
            retry_backoff_ms: 3_000,
            http_retries: 2,
            api_version: "1.48".to_string(),
            max_scrape_pages: 50,
            direct_export_fallback: true,
            user_agent: "Role-Permissions-Exporter/2.0".to_string(),
            chromium_path: None,
        }
    }
}

impl ExportConfig {
    /// Defaults overlaid with any `ROLE_EXPORT_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup. Unparseable values are
    /// ignored with a warning.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        set_parsed(&lookup, "ROLE_EXPORT_NAVIGATION_TIMEOUT_MS", &mut self.navigation_timeout_ms);
        set_parsed(&lookup, "ROLE_EXPORT_CONTROL_TIMEOUT_MS", &mut self.control_timeout_ms);
        set_parsed(&lookup, "ROLE_EXPORT_DOWNLOAD_TIMEOUT_MS", &mut self.download_timeout_ms);
        set_parsed(&lookup, "ROLE_EXPORT_REQUEST_TIMEOUT_MS", &mut self.request_timeout_ms);
        set_parsed(&lookup, "ROLE_EXPORT_VERIFY_TIMEOUT_MS", &mut self.verify_timeout_ms);
        set_parsed(&lookup, "ROLE_EXPORT_MAX_ATTEMPTS", &mut self.max_attempts);
        set_parsed(&lookup, "ROLE_EXPORT_RETRY_BACKOFF_MS", &mut self.retry_backoff_ms);
        set_parsed(&lookup, "ROLE_EXPORT_HTTP_RETRIES", &mut self.http_retries);
        set_parsed(&lookup, "ROLE_EXPORT_MAX_SCRAPE_PAGES", &mut self.max_scrape_pages);
        set_parsed(&lookup, "ROLE_EXPORT_DIRECT_EXPORT_FALLBACK", &mut self.direct_export_fallback);

        if let Some(v) = lookup("ROLE_EXPORT_API_VERSION") {
            self.api_version = v;
        }
        if let Some(v) = lookup("ROLE_EXPORT_USER_AGENT") {
            self.user_agent = v;
        }
        if let Some(v) = lookup("ROLE_EXPORT_CHROMIUM_PATH") {
            self.chromium_path = Some(PathBuf::from(v));
        }

        // Zero attempts would finalize roles without ever trying them.
        self.max_attempts = self.max_attempts.max(1);
        self
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn set_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, "ignoring unparseable configuration value"),
        }
    }
}
