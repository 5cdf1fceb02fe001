// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Remote URLs derived from host + org unit.

/// URL builder for one host and org unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    host: String,
    org_unit: u64,
    api_version: String,
}

impl Endpoints {
    pub fn new(host: &str, org_unit: u64, api_version: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            org_unit,
            api_version: api_version.to_string(),
        }
    }

    /// Identity probe; independent of the org unit.
    pub fn whoami(host: &str, api_version: &str) -> String {
        format!(
            "{}/d2l/api/lp/{api_version}/users/whoami",
            host.trim_end_matches('/')
        )
    }

    pub fn org_unit(&self) -> u64 {
        self.org_unit
    }

    /// Structured role listing.
    pub fn roles_api(&self) -> String {
        format!("{}/d2l/api/lp/{}/roles/", self.host, self.api_version)
    }

    /// Role administration page (first page of the list).
    pub fn role_list(&self) -> String {
        format!(
            "{}/d2l/lp/security/role_list.d2l?ou={}",
            self.host, self.org_unit
        )
    }

    /// Permission export preview for one role.
    pub fn export_preview(&self, role_id: &str) -> String {
        format!(
            "{}/d2l/lp/security/export_preview.d2l?roleId={role_id}&ou={}",
            self.host, self.org_unit
        )
    }

    /// Direct export file page for one role.
    pub fn export_file(&self, role_id: &str) -> String {
        format!(
            "{}/d2l/lp/security/export_file.d2l?roleId={role_id}&ou={}",
            self.host, self.org_unit
        )
    }
}
