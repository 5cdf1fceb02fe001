// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Role discovery: turn an org unit into the ordered list of roles to export.
//!
//! Two strategies implement [`RoleSource`] and are tried in a fixed order,
//! first success wins:
//!
//! 1. [`ApiRoleSource`]: the management API's role listing (JSON).
//! 2. [`MarkupRoleSource`]: the role administration page, scraped through
//!    the browser session.
//!
//! Only one strategy's result is ever used, so identifiers never mix
//! across strategies.

pub mod api;
pub mod markup;

pub use api::ApiRoleSource;
pub use markup::MarkupRoleSource;

use crate::config::{ExportConfig, DEFAULT_EXCLUDED_ROLES};
use crate::error::{ExportError, ExportResult};
use crate::http_client::HttpClient;
use crate::renderer::RenderContext;
use crate::session::{Endpoints, SessionContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A role as the remote system identifies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleDescriptor {
    /// Opaque remote identifier.
    pub id: String,
    /// Name for reporting and archive entry naming.
    pub name: String,
}

impl RoleDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Why a single strategy produced nothing.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// The remote could not be reached at all.
    #[error("unreachable: {0}")]
    Unreachable(String),
    /// The remote answered with a non-success status.
    #[error("rejected with status {0}")]
    Rejected(u16),
    /// The remote answered with something that is not a role listing.
    #[error("unexpected response: {0}")]
    Malformed(String),
}

/// Everything a strategy may use. Borrowed for the duration of discovery.
pub struct DiscoveryContext<'a> {
    pub session: &'a SessionContext,
    pub http: &'a HttpClient,
    pub endpoints: &'a Endpoints,
    pub page: &'a mut dyn RenderContext,
    pub config: &'a ExportConfig,
}

/// One way of listing the roles of an org unit.
#[async_trait]
pub trait RoleSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// List roles in the order the remote presents them.
    async fn list_roles(
        &self,
        cx: &mut DiscoveryContext<'_>,
    ) -> Result<Vec<RoleDescriptor>, SourceError>;
}

/// The structured strategy followed by the markup fallback.
pub fn default_sources(config: &ExportConfig) -> Vec<Box<dyn RoleSource>> {
    vec![
        Box::new(ApiRoleSource),
        Box::new(MarkupRoleSource::new(config.max_scrape_pages)),
    ]
}

/// Try each source in order and return the first non-empty listing.
///
/// A source that answers with zero roles does not count as a success.
/// When every source fails at the transport level the error is
/// [`ExportError::DiscoveryUnreachable`]; otherwise it is
/// [`ExportError::NoRolesFound`].
pub async fn discover(
    cx: &mut DiscoveryContext<'_>,
    sources: &[Box<dyn RoleSource>],
) -> ExportResult<Vec<RoleDescriptor>> {
    let org_unit = cx.endpoints.org_unit();
    let mut unreachable = Vec::new();

    for source in sources {
        match source.list_roles(cx).await {
            Ok(roles) if !roles.is_empty() => {
                let roles = dedupe(roles);
                tracing::info!(
                    strategy = source.name(),
                    org_unit,
                    count = roles.len(),
                    "roles discovered"
                );
                return Ok(roles);
            }
            Ok(_) => {
                tracing::warn!(strategy = source.name(), org_unit, "strategy found no roles");
            }
            Err(e) => {
                tracing::warn!(strategy = source.name(), org_unit, error = %e, "strategy failed");
                if let SourceError::Unreachable(detail) = &e {
                    unreachable.push(format!("{}: {detail}", source.name()));
                }
            }
        }
    }

    if !sources.is_empty() && unreachable.len() == sources.len() {
        Err(ExportError::DiscoveryUnreachable {
            org_unit,
            detail: unreachable.join("; "),
        })
    } else {
        Err(ExportError::NoRolesFound { org_unit })
    }
}

/// Drop repeated identifiers, keeping the first occurrence.
pub fn dedupe(roles: Vec<RoleDescriptor>) -> Vec<RoleDescriptor> {
    let mut seen = HashSet::new();
    roles
        .into_iter()
        .filter(|role| seen.insert(role.id.clone()))
        .collect()
}

/// Which discovered roles to export. Never reorders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSelection {
    /// Display names to leave out.
    pub exclude: Vec<String>,
    /// When set, only these display names are kept.
    pub include: Option<Vec<String>>,
}

impl Default for RoleSelection {
    fn default() -> Self {
        Self {
            exclude: DEFAULT_EXCLUDED_ROLES.iter().map(|s| s.to_string()).collect(),
            include: None,
        }
    }
}

impl RoleSelection {
    /// Keep every role.
    pub fn all() -> Self {
        Self {
            exclude: Vec::new(),
            include: None,
        }
    }

    pub fn apply(&self, roles: Vec<RoleDescriptor>) -> Vec<RoleDescriptor> {
        roles
            .into_iter()
            .filter(|role| !self.exclude.iter().any(|name| name == &role.name))
            .filter(|role| {
                self.include
                    .as_ref()
                    .map_or(true, |names| names.iter().any(|name| name == &role.name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[(&str, &str)]) -> Vec<RoleDescriptor> {
        names
            .iter()
            .map(|(id, name)| RoleDescriptor::new(*id, *name))
            .collect()
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let deduped = dedupe(roles(&[("1", "A"), ("2", "B"), ("1", "A again")]));
        assert_eq!(deduped, roles(&[("1", "A"), ("2", "B")]));
    }

    #[test]
    fn test_default_selection_excludes_monitor() {
        let kept = RoleSelection::default().apply(roles(&[
            ("1", "Instructor"),
            ("2", "D2LMonitor"),
            ("3", "Student"),
        ]));
        assert_eq!(kept, roles(&[("1", "Instructor"), ("3", "Student")]));
    }

    #[test]
    fn test_selection_include_preserves_discovery_order() {
        let selection = RoleSelection {
            exclude: Vec::new(),
            include: Some(vec!["Student".into(), "Instructor".into()]),
        };
        let kept = selection.apply(roles(&[
            ("1", "Instructor"),
            ("2", "TA"),
            ("3", "Student"),
        ]));
        assert_eq!(kept, roles(&[("1", "Instructor"), ("3", "Student")]));
    }

    #[test]
    fn test_selection_all_keeps_everything() {
        let input = roles(&[("1", "D2LMonitor")]);
        assert_eq!(RoleSelection::all().apply(input.clone()), input);
    }
}
