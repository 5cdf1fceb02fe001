// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Single-attempt permission export for one role.
//!
//! Drives the browser context through the role's export preview page:
//! click Export, wait for the download link, pull the file through the
//! page's session. Every expected failure comes back as an
//! [`ExtractionOutcome::Failure`] with `attempts == 1`; retrying is the
//! coordinator's business.

use crate::archive::sanitize_filename;
use crate::config::ExportConfig;
use crate::discovery::RoleDescriptor;
use crate::error::FailureKind;
use crate::renderer::{is_timeout, DownloadedFile, Locator, RenderContext};
use crate::report::ExtractionOutcome;
use crate::session::Endpoints;

/// Label of the control that starts the export.
pub const EXPORT_BUTTON_LABEL: &str = "Export";

/// The link the export page shows once the file is ready.
pub const DOWNLOAD_LINK_SELECTOR: &str = r#"a[href*="viewFile.d2lfile"]"#;

/// Runs one export attempt against a rendering context.
#[derive(Debug, Clone)]
pub struct RoleExtractor {
    navigation_timeout_ms: u64,
    control_timeout_ms: u64,
    download_timeout_ms: u64,
    direct_export_fallback: bool,
}

impl RoleExtractor {
    pub fn new(config: &ExportConfig) -> Self {
        Self {
            navigation_timeout_ms: config.navigation_timeout_ms,
            control_timeout_ms: config.control_timeout_ms,
            download_timeout_ms: config.download_timeout_ms,
            direct_export_fallback: config.direct_export_fallback,
        }
    }

    /// One attempt. Never fails: every failure mode is a value.
    pub async fn extract(
        &self,
        page: &mut dyn RenderContext,
        endpoints: &Endpoints,
        role: &RoleDescriptor,
    ) -> ExtractionOutcome {
        match self.try_extract(page, endpoints, role).await {
            Ok(file) => {
                let content_name = content_name(file.suggested_name.as_deref(), role);
                tracing::debug!(role = %role.name, bytes = file.bytes.len(), "role exported");
                ExtractionOutcome::Success {
                    role: role.clone(),
                    content_name,
                    content: file.bytes,
                    attempts: 1,
                }
            }
            Err(reason) => {
                tracing::debug!(role = %role.name, %reason, "export attempt failed");
                ExtractionOutcome::Failure {
                    role: role.clone(),
                    reason,
                    attempts: 1,
                }
            }
        }
    }

    async fn try_extract(
        &self,
        page: &mut dyn RenderContext,
        endpoints: &Endpoints,
        role: &RoleDescriptor,
    ) -> Result<DownloadedFile, FailureKind> {
        page.navigate(&endpoints.export_preview(&role.id), self.navigation_timeout_ms)
            .await
            .map_err(|e| navigation_failure(&e))?;

        let export_button = Locator::button(EXPORT_BUTTON_LABEL);
        let clicked = match page.wait_for(&export_button, self.control_timeout_ms).await {
            Ok(true) => {
                page.click(&export_button)
                    .await
                    .map_err(|_| FailureKind::ExportControlMissing)?;
                true
            }
            Ok(false) => false,
            Err(e) => return Err(navigation_failure(&e)),
        };

        if !clicked {
            if !self.direct_export_fallback {
                return Err(FailureKind::ExportControlMissing);
            }
            tracing::debug!(role = %role.name, "no Export control, using direct export page");
            page.navigate(&endpoints.export_file(&role.id), self.navigation_timeout_ms)
                .await
                .map_err(|e| navigation_failure(&e))?;
        }

        let link = Locator::css(DOWNLOAD_LINK_SELECTOR);
        match page.wait_for(&link, self.download_timeout_ms).await {
            Ok(true) => {}
            // Export was clicked but nothing came: the download is late.
            Ok(false) if clicked => return Err(FailureKind::DownloadTimeout),
            // Neither the control nor the direct page offered a download.
            Ok(false) => return Err(FailureKind::ExportControlMissing),
            Err(e) => return Err(navigation_failure(&e)),
        }

        let file = page
            .fetch_linked_file(&link, self.download_timeout_ms)
            .await
            .map_err(|e| {
                tracing::debug!(role = %role.name, error = %e, "download not delivered");
                FailureKind::DownloadTimeout
            })?;

        if file.bytes.is_empty() {
            return Err(FailureKind::EmptyDownload);
        }
        Ok(file)
    }
}

fn navigation_failure(err: &anyhow::Error) -> FailureKind {
    if is_timeout(err) {
        FailureKind::NavigationTimeout
    } else {
        FailureKind::Navigation
    }
}

/// Archive entry name: the server's suggestion when usable, else
/// `<display name>_<id>.txt`, else `role_<id>.txt`.
pub fn content_name(suggested: Option<&str>, role: &RoleDescriptor) -> String {
    if let Some(name) = suggested {
        let cleaned = sanitize_filename(name, "");
        if !cleaned.is_empty() {
            return cleaned;
        }
    }
    match sanitize_filename(&role.name, "") {
        stem if stem.is_empty() => format!("role_{}.txt", role.id),
        stem => format!("{stem}_{}.txt", role.id),
    }
}
