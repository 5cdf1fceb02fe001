// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured discovery through the management API's role listing.

use super::{DiscoveryContext, RoleDescriptor, RoleSource, SourceError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleData {
    identifier: Value,
    #[serde(default)]
    display_name: Option<String>,
}

/// Lists roles from `GET /d2l/api/lp/{version}/roles/`.
pub struct ApiRoleSource;

#[async_trait]
impl RoleSource for ApiRoleSource {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn list_roles(
        &self,
        cx: &mut DiscoveryContext<'_>,
    ) -> Result<Vec<RoleDescriptor>, SourceError> {
        let resp = cx
            .http
            .get(
                &cx.endpoints.roles_api(),
                cx.session.credential(),
                Some("application/json"),
                cx.config.request_timeout_ms,
            )
            .await
            .map_err(|e| SourceError::Unreachable(e.to_string()))?;

        if !resp.is_success() {
            return Err(SourceError::Rejected(resp.status));
        }

        parse_roles(&resp.body)
    }
}

/// Parse a JSON array of `{Identifier, DisplayName}` objects.
///
/// Identifiers may be strings or numbers; entries without one are skipped.
/// A missing display name becomes `Role_<id>`.
pub fn parse_roles(body: &str) -> Result<Vec<RoleDescriptor>, SourceError> {
    let data: Vec<RoleData> =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    Ok(data
        .into_iter()
        .filter_map(|role| {
            let id = match role.identifier {
                Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let name = role
                .display_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Role_{id}"));
            Some(RoleDescriptor { id, name })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles_string_and_numeric_ids() {
        let body = r#"[
            {"Identifier": "110", "DisplayName": "Instructor", "Code": null},
            {"Identifier": 111, "DisplayName": " Student "},
            {"Identifier": "112"}
        ]"#;
        let roles = parse_roles(body).unwrap();
        assert_eq!(
            roles,
            vec![
                RoleDescriptor::new("110", "Instructor"),
                RoleDescriptor::new("111", "Student"),
                RoleDescriptor::new("112", "Role_112"),
            ]
        );
    }

    #[test]
    fn test_parse_roles_skips_missing_ids() {
        let body = r#"[{"Identifier": null, "DisplayName": "Ghost"}, {"Identifier": "", "DisplayName": "Blank"}]"#;
        assert!(parse_roles(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_roles_schema_mismatch() {
        assert!(matches!(
            parse_roles(r#"{"Items": []}"#),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            parse_roles("<html>login</html>"),
            Err(SourceError::Malformed(_))
        ));
    }
}
