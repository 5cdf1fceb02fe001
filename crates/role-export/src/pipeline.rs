// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end run: verify → discover → extract, with the browser context
//! acquired once and released on every exit path.

use crate::config::ExportConfig;
use crate::coordinator::Coordinator;
use crate::discovery::{self, DiscoveryContext, RoleSelection, RoleSource};
use crate::error::{ExportError, ExportResult};
use crate::http_client::HttpClient;
use crate::progress::ProgressSender;
use crate::renderer::{RenderContext, Renderer};
use crate::report::RunReport;
use crate::session::{AuthStatus, SessionContext};
use tokio_util::sync::CancellationToken;

/// A configured export pipeline. One `run` per session.
pub struct Pipeline {
    config: ExportConfig,
    http: HttpClient,
    selection: RoleSelection,
    sources: Vec<Box<dyn RoleSource>>,
}

impl Pipeline {
    pub fn new(config: ExportConfig) -> Self {
        let http = HttpClient::new(&config);
        let sources = discovery::default_sources(&config);
        Self {
            config,
            http,
            selection: RoleSelection::default(),
            sources,
        }
    }

    pub fn with_selection(mut self, selection: RoleSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Replace the discovery strategies (tried in the given order).
    pub fn with_sources(mut self, sources: Vec<Box<dyn RoleSource>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_http_client(mut self, http: HttpClient) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Probe the credential without starting a run.
    pub async fn verify(&self, session: &SessionContext) -> ExportResult<AuthStatus> {
        session
            .verify(&self.http, &self.config.api_version, self.config.verify_timeout_ms)
            .await
    }

    /// Run the whole export for one org unit.
    ///
    /// Fatal before extraction: transport failure or rejected credential
    /// during verification, cancellation before the browser context is
    /// opened, browser start-up failure, or exhausted discovery. Once roles
    /// are discovered the result is always a report. The session is
    /// consumed and dropped (wiping the credential) before this returns; the
    /// renderer is shut down on every path.
    pub async fn run(
        &self,
        session: SessionContext,
        org_unit: u64,
        renderer: &dyn Renderer,
        observer: Option<ProgressSender>,
        cancel: CancellationToken,
    ) -> ExportResult<RunReport> {
        let result = self
            .run_with_renderer(&session, org_unit, renderer, observer, &cancel)
            .await;

        if let Err(e) = renderer.shutdown().await {
            tracing::warn!(error = %e, "renderer shutdown failed");
        }
        drop(session);

        result
    }

    async fn run_with_renderer(
        &self,
        session: &SessionContext,
        org_unit: u64,
        renderer: &dyn Renderer,
        observer: Option<ProgressSender>,
        cancel: &CancellationToken,
    ) -> ExportResult<RunReport> {
        match self.verify(session).await? {
            AuthStatus::Authenticated { .. } => {}
            AuthStatus::Unauthenticated { status } => return Err(ExportError::Auth { status }),
        }
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        let mut page = renderer
            .new_context()
            .await
            .map_err(|e| ExportError::Browser(format!("{e:#}")))?;

        let result = self
            .run_in_context(session, org_unit, page.as_mut(), observer, cancel)
            .await;

        if let Err(e) = page.close().await {
            tracing::warn!(error = %e, "browser context close failed");
        }

        result
    }

    async fn run_in_context(
        &self,
        session: &SessionContext,
        org_unit: u64,
        page: &mut dyn RenderContext,
        observer: Option<ProgressSender>,
        cancel: &CancellationToken,
    ) -> ExportResult<RunReport> {
        page.set_cookies(
            session.host(),
            &session.credential().cookie_pairs(),
            session.is_secure(),
        )
        .await
        .map_err(|e| ExportError::Browser(format!("{e:#}")))?;

        let endpoints = session.endpoints(org_unit, &self.config.api_version);

        let roles = {
            let mut cx = DiscoveryContext {
                session,
                http: &self.http,
                endpoints: &endpoints,
                page: &mut *page,
                config: &self.config,
            };
            discovery::discover(&mut cx, &self.sources).await?
        };

        let discovered = roles.len();
        let roles = self.selection.apply(roles);
        tracing::info!(
            org_unit,
            discovered,
            selected = roles.len(),
            "role selection applied"
        );

        // From here on cancellation yields a report; roles not started are
        // listed as unprocessed.
        let coordinator = Coordinator::from_config(&self.config);
        Ok(coordinator
            .run(page, &endpoints, roles, observer, cancel)
            .await)
    }
}
