// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scripted in-memory renderer for pipeline tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use role_export::renderer::{
    DownloadedFile, Locator, NavigationResult, RenderContext, RenderTimeout, Renderer,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// How a role's export page behaves on every attempt.
#[derive(Debug, Clone)]
pub enum RoleBehavior {
    /// Export control present, file delivered.
    Export { name: Option<String>, bytes: Vec<u8> },
    /// Every navigation to the role's pages times out.
    NavigationTimeout,
    /// No Export control and no download link anywhere.
    NoExportControl,
}

impl RoleBehavior {
    pub fn file(name: &str, body: &str) -> Self {
        RoleBehavior::Export {
            name: Some(name.to_string()),
            bytes: body.as_bytes().to_vec(),
        }
    }
}

/// What the fake browser observed.
#[derive(Debug, Default)]
pub struct Recorded {
    pub visited: Vec<String>,
    pub cookies: Vec<(String, String)>,
    pub attempts: HashMap<String, u32>,
    pub contexts_opened: usize,
    pub contexts_closed: usize,
    pub shutdowns: usize,
}

#[derive(Default)]
struct Script {
    role_list_html: String,
    roles: HashMap<String, RoleBehavior>,
    cancel_after: Option<(String, CancellationToken)>,
}

/// Renderer whose pages follow a per-role script.
#[derive(Clone, Default)]
pub struct FakeRenderer {
    script: Arc<Mutex<Script>>,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTML served for the role administration page.
    pub fn with_role_list(self, html: &str) -> Self {
        self.script.lock().unwrap().role_list_html = html.to_string();
        self
    }

    pub fn with_role(self, id: &str, behavior: RoleBehavior) -> Self {
        self.script
            .lock()
            .unwrap()
            .roles
            .insert(id.to_string(), behavior);
        self
    }

    /// Cancel `token` as soon as role `id` has delivered its file.
    pub fn cancel_after(self, id: &str, token: CancellationToken) -> Self {
        self.script.lock().unwrap().cancel_after = Some((id.to_string(), token));
        self
    }

    pub fn visited_matching(&self, needle: &str) -> usize {
        self.recorded
            .lock()
            .unwrap()
            .visited
            .iter()
            .filter(|u| u.contains(needle))
            .count()
    }

    pub fn attempts(&self, id: &str) -> u32 {
        self.recorded
            .lock()
            .unwrap()
            .attempts
            .get(id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.recorded.lock().unwrap().contexts_opened += 1;
        Ok(Box::new(FakePage {
            script: Arc::clone(&self.script),
            recorded: Arc::clone(&self.recorded),
            url: String::new(),
            html: String::new(),
            role: None,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.recorded.lock().unwrap().shutdowns += 1;
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        let rec = self.recorded.lock().unwrap();
        rec.contexts_opened - rec.contexts_closed
    }
}

struct FakePage {
    script: Arc<Mutex<Script>>,
    recorded: Arc<Mutex<Recorded>>,
    url: String,
    html: String,
    /// Behaviour of the role whose page is loaded.
    role: Option<(String, RoleBehavior)>,
}

fn role_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("roleId=")?;
    Some(rest.split('&').next().unwrap_or_default().to_string())
}

impl FakePage {
    fn exportable(&self) -> bool {
        matches!(self.role, Some((_, RoleBehavior::Export { .. })))
    }
}

#[async_trait]
impl RenderContext for FakePage {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        self.recorded.lock().unwrap().visited.push(url.to_string());
        self.url = url.to_string();
        self.role = None;

        if url.contains("role_list.d2l") {
            self.html = self.script.lock().unwrap().role_list_html.clone();
        } else if let Some(id) = role_id(url) {
            if url.contains("export_preview.d2l") {
                *self
                    .recorded
                    .lock()
                    .unwrap()
                    .attempts
                    .entry(id.clone())
                    .or_default() += 1;
            }
            let behavior = self
                .script
                .lock()
                .unwrap()
                .roles
                .get(&id)
                .cloned()
                .unwrap_or(RoleBehavior::NoExportControl);
            if matches!(behavior, RoleBehavior::NavigationTimeout) {
                return Err(RenderTimeout::new("navigation", timeout_ms).into());
            }
            self.html = String::new();
            self.role = Some((id, behavior));
        } else {
            self.html = String::new();
        }

        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn html(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn set_cookies(
        &mut self,
        _url: &str,
        cookies: &[(String, String)],
        _secure: bool,
    ) -> Result<()> {
        self.recorded
            .lock()
            .unwrap()
            .cookies
            .extend(cookies.iter().cloned());
        Ok(())
    }

    async fn wait_for(&self, _locator: &Locator, _timeout_ms: u64) -> Result<bool> {
        Ok(self.exportable())
    }

    async fn click(&mut self, _locator: &Locator) -> Result<()> {
        if self.exportable() {
            Ok(())
        } else {
            anyhow::bail!("no element matches")
        }
    }

    async fn fetch_linked_file(
        &mut self,
        _locator: &Locator,
        _timeout_ms: u64,
    ) -> Result<DownloadedFile> {
        let Some((id, RoleBehavior::Export { name, bytes })) = self.role.clone() else {
            anyhow::bail!("no download link on page");
        };

        if let Some((cancel_id, token)) = &self.script.lock().unwrap().cancel_after {
            if *cancel_id == id {
                token.cancel();
            }
        }

        Ok(DownloadedFile {
            suggested_name: name,
            bytes,
        })
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.recorded.lock().unwrap().contexts_closed += 1;
        Ok(())
    }
}
