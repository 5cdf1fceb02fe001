// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fallback discovery: scrape the role administration page through the
//! browser session, following "next" pagination links.

use super::{DiscoveryContext, RoleDescriptor, RoleSource, SourceError};
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;
use url::Url;

/// One parsed page of the role list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolePage {
    pub roles: Vec<RoleDescriptor>,
    /// Absolute URL of the next page, if the page links one.
    pub next: Option<String>,
}

/// Scrapes `role_list.d2l` for anchors carrying `roleId=<digits>`.
pub struct MarkupRoleSource {
    max_pages: usize,
}

impl MarkupRoleSource {
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
        }
    }
}

#[async_trait]
impl RoleSource for MarkupRoleSource {
    fn name(&self) -> &'static str {
        "markup"
    }

    async fn list_roles(
        &self,
        cx: &mut DiscoveryContext<'_>,
    ) -> Result<Vec<RoleDescriptor>, SourceError> {
        let mut roles = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(cx.endpoints.role_list());

        for page_no in 0..self.max_pages {
            let Some(url) = next.take() else { break };
            if !seen.insert(url.clone()) {
                break;
            }

            let loaded = match cx.page.navigate(&url, cx.config.navigation_timeout_ms).await {
                Ok(_) => cx.page.html().await,
                Err(e) => Err(e),
            };

            let html = match loaded {
                Ok(html) => html,
                // The first page is the strategy; later pages only extend it.
                Err(e) if page_no == 0 => return Err(SourceError::Unreachable(format!("{e:#}"))),
                Err(e) => {
                    tracing::warn!(page_no, error = %e, "role list pagination stopped early");
                    break;
                }
            };

            let parsed = parse_role_page(&html, &url);
            tracing::debug!(page_no, found = parsed.roles.len(), "scraped role list page");
            roles.extend(parsed.roles);
            next = parsed.next;
        }

        Ok(super::dedupe(roles))
    }
}

fn role_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"roleId=(\d+)").expect("role id regex is valid"))
}

fn anchor_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("a[href]").expect("anchor selector is valid"))
}

/// Parse one role list page. `base_url` resolves relative "next" links.
pub fn parse_role_page(html: &str, base_url: &str) -> RolePage {
    let document = Html::parse_document(html);
    let anchors = anchor_selector();

    let mut page = RolePage::default();

    for anchor in document.select(anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        if let Some(caps) = role_id_regex().captures(href) {
            let id = caps[1].to_string();
            let text = anchor.text().collect::<String>();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            let name = if text.is_empty() {
                format!("Role_{id}")
            } else {
                text
            };
            page.roles.push(RoleDescriptor { id, name });
        }

        let is_next = anchor
            .value()
            .attr("title")
            .is_some_and(|t| t.to_lowercase().contains("next"));
        if is_next && page.next.is_none() {
            page.next = Url::parse(base_url)
                .and_then(|base| base.join(href))
                .map(|u| u.to_string())
                .ok();
        }
    }

    page
}
