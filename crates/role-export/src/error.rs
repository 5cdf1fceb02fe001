// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the export pipeline.
//!
//! [`ExportError`] covers the fatal paths (bad input, authentication,
//! exhausted discovery, cancellation before extraction). Per-role failures
//! are never errors: they are [`FailureKind`] values carried inside an
//! extraction outcome.

use serde::{Deserialize, Serialize};

/// Fatal errors that abort a run or reject its inputs.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(&'static str),

    #[error("Transport error: {0}")]
    Transport(String),

    /// The host answered but rejected the session credential.
    #[error("Authentication failed (status {status}); the session cookie is expired or the host is wrong")]
    Auth { status: u16 },

    /// Every discovery strategy ran without producing a role.
    #[error("No roles found for org unit {org_unit}")]
    NoRolesFound { org_unit: u64 },

    /// Every discovery strategy failed at the transport level.
    #[error("Role discovery unreachable for org unit {org_unit}: {detail}")]
    DiscoveryUnreachable { org_unit: u64, detail: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run cancelled")]
    Cancelled,
}

impl ExportError {
    /// True for the two discovery-exhausted variants.
    pub fn is_discovery_exhausted(&self) -> bool {
        matches!(
            self,
            ExportError::NoRolesFound { .. } | ExportError::DiscoveryUnreachable { .. }
        )
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(e: reqwest::Error) -> Self {
        // Query strings never reach logs.
        ExportError::Transport(e.without_url().to_string())
    }
}

/// Convenience result type.
pub type ExportResult<T> = Result<T, ExportError>;

/// Why a single extraction attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// The role page did not load within the navigation bound.
    NavigationTimeout,
    /// The role page failed to load for another transient reason.
    Navigation,
    /// The page has no usable export control; the layout is unexpected.
    ExportControlMissing,
    /// The export was triggered but no file arrived within the bound.
    DownloadTimeout,
    /// The file arrived with zero bytes.
    EmptyDownload,
}

impl FailureKind {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureKind::ExportControlMissing)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NavigationTimeout => write!(f, "navigation timed out"),
            Self::Navigation => write!(f, "navigation failed"),
            Self::ExportControlMissing => write!(f, "export control missing"),
            Self::DownloadTimeout => write!(f, "download timed out"),
            Self::EmptyDownload => write!(f, "download was empty"),
        }
    }
}
