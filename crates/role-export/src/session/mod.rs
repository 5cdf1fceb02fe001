// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Session context: the target host plus the caller's session credential.
//!
//! A [`SessionContext`] is built once per run and owned by that run. It is
//! validated by format only; [`SessionContext::verify`] probes the host to
//! find out whether the credential is live. The credential's storage is
//! zeroed when the context is dropped.

pub mod endpoints;

pub use endpoints::Endpoints;

use crate::error::{ExportError, ExportResult};
use crate::http_client::HttpClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Hosts refused unless loopback is explicitly allowed.
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]", "0.0.0.0"];

/// An opaque session cookie header.
///
/// Never printed, never serialized. The backing bytes are overwritten on
/// drop.
pub struct Credential(String);

impl Credential {
    /// Normalize a pasted cookie header: trim, drop a leading `Cookie:`,
    /// and canonicalize `;` separators.
    pub fn parse(raw: &str) -> ExportResult<Self> {
        let mut value = raw.trim();
        if value
            .get(..7)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("cookie:"))
        {
            value = value[7..].trim();
        }

        let normalized = value
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("; ");

        if normalized.is_empty() {
            return Err(ExportError::InvalidCredential("cookie header is empty"));
        }
        Ok(Self(normalized))
    }

    /// The value for a `Cookie` request header.
    pub fn header_value(&self) -> &str {
        &self.0
    }

    /// Split into `(name, value)` pairs for installing into a browser.
    /// Fragments without `=` are skipped.
    pub fn cookie_pairs(&self) -> Vec<(String, String)> {
        self.0
            .split("; ")
            .filter_map(|part| {
                let (name, value) = part.split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().trim_matches('"').to_string()))
            })
            .collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([redacted])")
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        let mut bytes = std::mem::take(&mut self.0).into_bytes();
        bytes.iter_mut().for_each(|b| *b = 0);
        std::hint::black_box(&bytes);
    }
}

/// Outcome of probing the host with the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthStatus {
    /// The host accepted the session; `user` is the display name it reported.
    Authenticated { user: String },
    /// The host answered but did not accept the session.
    Unauthenticated { status: u16 },
}

impl AuthStatus {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthStatus::Authenticated { .. })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WhoAmI {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

/// Host and credential for one run.
#[derive(Debug)]
pub struct SessionContext {
    host: String,
    url: Url,
    credential: Credential,
}

impl SessionContext {
    /// Build a context for a public host. Loopback hosts are rejected.
    pub fn new(host: &str, credential: &str) -> ExportResult<Self> {
        Self::build(host, credential, false)
    }

    /// Like [`SessionContext::new`] but accepts loopback hosts, for local
    /// mirrors and mock servers.
    pub fn new_allow_loopback(host: &str, credential: &str) -> ExportResult<Self> {
        Self::build(host, credential, true)
    }

    fn build(host: &str, credential: &str, allow_loopback: bool) -> ExportResult<Self> {
        let host = normalize_host(host);
        let url = validate_host(&host, allow_loopback)?;
        let credential = Credential::parse(credential)?;
        Ok(Self {
            host,
            url,
            credential,
        })
    }

    /// Base URL without a trailing slash.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// `host[:port]` of the base URL.
    pub fn netloc(&self) -> String {
        match (self.url.host_str(), self.url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            _ => String::new(),
        }
    }

    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "https"
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Endpoint builder for one org unit.
    pub fn endpoints(&self, org_unit: u64, api_version: &str) -> Endpoints {
        Endpoints::new(&self.host, org_unit, api_version)
    }

    /// Probe the whoami endpoint.
    ///
    /// Returns `Unauthenticated` for any answered request that does not
    /// identify a user (4xx, 5xx, a login page instead of JSON). Only
    /// transport failures are errors.
    pub async fn verify(
        &self,
        client: &HttpClient,
        api_version: &str,
        timeout_ms: u64,
    ) -> ExportResult<AuthStatus> {
        let url = Endpoints::whoami(&self.host, api_version);
        let resp = client
            .get(&url, &self.credential, Some("application/json"), timeout_ms)
            .await?;

        if resp.status != 200 {
            tracing::warn!(status = resp.status, "session probe rejected");
            return Ok(AuthStatus::Unauthenticated {
                status: resp.status,
            });
        }

        match serde_json::from_str::<WhoAmI>(&resp.body) {
            Ok(who) => {
                let user = format!("{} {}", who.first_name, who.last_name)
                    .trim()
                    .to_string();
                tracing::info!("session verified");
                Ok(AuthStatus::Authenticated { user })
            }
            Err(_) => {
                tracing::warn!("session probe returned a non-JSON body");
                Ok(AuthStatus::Unauthenticated {
                    status: resp.status,
                })
            }
        }
    }
}

/// Trim whitespace and trailing slashes.
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_string()
}

/// Reject anything that is not an http(s) URL with a hostname, and
/// loopback addresses unless allowed.
pub fn validate_host(host: &str, allow_loopback: bool) -> ExportResult<Url> {
    let url = Url::parse(host).map_err(|e| ExportError::InvalidHost(format!("{host}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExportError::InvalidHost(format!(
            "{host}: scheme must be http or https"
        )));
    }

    let hostname = url
        .host_str()
        .ok_or_else(|| ExportError::InvalidHost(format!("{host}: missing hostname")))?;

    if !allow_loopback && LOOPBACK_HOSTS.contains(&hostname) {
        return Err(ExportError::InvalidHost(format!(
            "{host}: local addresses are not allowed"
        )));
    }

    Ok(url)
}
