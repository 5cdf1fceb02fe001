// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Renderer abstraction for browser-driven pages.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). Discovery's
//! markup strategy and the role extractor only ever see a
//! `&mut dyn RenderContext`.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A bounded wait that ran out.
///
/// Context implementations return this (wrapped in `anyhow::Error`) so
/// callers can tell timeouts from other failures with `downcast_ref`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} timed out after {timeout_ms}ms")]
pub struct RenderTimeout {
    pub operation: &'static str,
    pub timeout_ms: u64,
}

impl RenderTimeout {
    pub fn new(operation: &'static str, timeout_ms: u64) -> Self {
        Self {
            operation,
            timeout_ms,
        }
    }
}

/// How to find an element on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A CSS selector; the first match wins.
    Css(String),
    /// A button-like element whose trimmed label equals `label`,
    /// case-insensitively.
    Button { label: String },
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }

    pub fn button(label: &str) -> Self {
        Locator::Button {
            label: label.to_string(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(sel) => write!(f, "css `{sel}`"),
            Locator::Button { label } => write!(f, "button \"{label}\""),
        }
    }
}

/// A file retrieved through the page's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Filename offered by the server, if any.
    pub suggested_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab).
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL. Exceeding `timeout_ms` yields a [`RenderTimeout`].
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Get the full page HTML.
    async fn html(&self) -> Result<String>;
    /// Get the current URL.
    async fn current_url(&self) -> Result<String>;
    /// Install session cookies for `url`'s origin.
    async fn set_cookies(
        &mut self,
        url: &str,
        cookies: &[(String, String)],
        secure: bool,
    ) -> Result<()>;
    /// Wait until the locator matches a visible element. `Ok(false)` when the
    /// bound runs out.
    async fn wait_for(&self, locator: &Locator, timeout_ms: u64) -> Result<bool>;
    /// Click the first element matching the locator.
    async fn click(&mut self, locator: &Locator) -> Result<()>;
    /// Retrieve the file behind the link matched by `locator`, through the
    /// page's own session, without touching disk. Exceeding `timeout_ms`
    /// yields a [`RenderTimeout`].
    async fn fetch_linked_file(&mut self, locator: &Locator, timeout_ms: u64)
        -> Result<DownloadedFile>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Whether an error chain bottoms out in a [`RenderTimeout`].
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<RenderTimeout>().is_some())
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// Prefers the RFC 5987 `filename*=` form, falling back to `filename=`.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    static EXTENDED: OnceLock<regex::Regex> = OnceLock::new();
    static PLAIN: OnceLock<regex::Regex> = OnceLock::new();

    let extended = EXTENDED.get_or_init(|| {
        regex::Regex::new(r#"(?i)filename\*\s*=\s*(?:[\w-]+'[\w-]*')?"?([^";]+)"?"#)
            .expect("extended filename regex is valid")
    });
    let plain = PLAIN.get_or_init(|| {
        regex::Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#)
            .expect("plain filename regex is valid")
    });

    let raw = extended
        .captures(header)
        .and_then(|c| c.get(1))
        .map(|m| percent_decode(m.as_str()))
        .or_else(|| {
            plain
                .captures(header)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })?;

    let name = raw.trim().rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn percent_decode(value: &str) -> String {
    url::form_urlencoded::parse(format!("v={}", value.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| value.to_string())
}
