// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequential extraction over all discovered roles.
//!
//! Roles run strictly in discovery order on one rendering context. Each
//! role is retried in place, with a pause between attempts, until it
//! succeeds, fails with a non-retryable kind, or runs out of attempts. The
//! run can be cancelled between roles; roles not yet started are reported
//! as unprocessed rather than failed.

use crate::config::ExportConfig;
use crate::discovery::RoleDescriptor;
use crate::extractor::RoleExtractor;
use crate::progress::{self, ProgressEventKind, ProgressSender};
use crate::renderer::RenderContext;
use crate::report::{ExtractionOutcome, RunReport};
use crate::session::Endpoints;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// How often and how patiently a role is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per role, including the first. At least 1.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }

    /// Whether `attempt` (1-based) failing with `outcome` earns another try.
    pub fn should_retry(&self, outcome: &ExtractionOutcome, attempt: u32) -> bool {
        match outcome {
            ExtractionOutcome::Failure { reason, .. } => {
                reason.is_retryable() && attempt < self.max_attempts
            }
            ExtractionOutcome::Success { .. } => false,
        }
    }
}

/// Drives the extractor over every role and builds the run report.
pub struct Coordinator {
    extractor: RoleExtractor,
    retry: RetryPolicy,
}

impl Coordinator {
    pub fn new(extractor: RoleExtractor, retry: RetryPolicy) -> Self {
        Self { extractor, retry }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(RoleExtractor::new(config), RetryPolicy::from_config(config))
    }

    /// Process every role in order and return the finished report.
    ///
    /// One `RoleFinished` event is emitted per finalized role. The report is
    /// only returned once every role is finalized or the run is cancelled.
    pub async fn run(
        &self,
        page: &mut dyn RenderContext,
        endpoints: &Endpoints,
        roles: Vec<RoleDescriptor>,
        observer: Option<ProgressSender>,
        cancel: &CancellationToken,
    ) -> RunReport {
        let run_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();
        let total = roles.len();
        let mut seq = 0u64;
        let mut outcomes = Vec::with_capacity(total);
        let mut unprocessed = Vec::new();
        let mut cancelled = false;

        tracing::info!(run_id = %run_id, total, "extraction started");
        progress::emit(
            &observer,
            &run_id,
            &mut seq,
            ProgressEventKind::RunStarted { total_roles: total },
        );

        for (idx, role) in roles.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                unprocessed = roles[idx..].to_vec();
                break;
            }

            let outcome = self
                .extract_with_retry(page, endpoints, role, &observer, &run_id, &mut seq, cancel)
                .await;

            tracing::info!(
                run_id = %run_id,
                role = %role.name,
                success = outcome.is_success(),
                attempts = outcome.attempts(),
                "role finalized"
            );
            progress::emit(
                &observer,
                &run_id,
                &mut seq,
                ProgressEventKind::RoleFinished {
                    index: idx + 1,
                    total,
                    role: role.name.clone(),
                    outcome: outcome.kind(),
                },
            );
            outcomes.push(outcome);
        }

        let report = RunReport {
            run_id: run_id.clone(),
            total_roles: total,
            outcomes,
            unprocessed,
            cancelled,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        if cancelled {
            tracing::warn!(
                run_id = %run_id,
                processed = report.outcomes.len(),
                remaining = report.unprocessed.len(),
                "extraction cancelled"
            );
            progress::emit(
                &observer,
                &run_id,
                &mut seq,
                ProgressEventKind::RunCancelled {
                    processed: report.outcomes.len(),
                    remaining: report.unprocessed.len(),
                },
            );
        } else {
            tracing::info!(
                run_id = %run_id,
                succeeded = report.succeeded(),
                failed = report.failed(),
                elapsed_ms = report.elapsed_ms,
                "extraction finished"
            );
            progress::emit(
                &observer,
                &run_id,
                &mut seq,
                ProgressEventKind::RunFinished {
                    succeeded: report.succeeded(),
                    failed: report.failed(),
                    elapsed_ms: report.elapsed_ms,
                },
            );
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    async fn extract_with_retry(
        &self,
        page: &mut dyn RenderContext,
        endpoints: &Endpoints,
        role: &RoleDescriptor,
        observer: &Option<ProgressSender>,
        run_id: &str,
        seq: &mut u64,
        cancel: &CancellationToken,
    ) -> ExtractionOutcome {
        let mut attempt = 1u32;

        loop {
            let outcome = self
                .extractor
                .extract(page, endpoints, role)
                .await
                .with_attempts(attempt);

            let reason = match outcome {
                ExtractionOutcome::Failure { reason, .. } => reason,
                ExtractionOutcome::Success { .. } => return outcome,
            };

            let will_retry = self.retry.should_retry(&outcome, attempt);
            progress::emit(
                observer,
                run_id,
                seq,
                ProgressEventKind::AttemptFailed {
                    role: role.name.clone(),
                    attempt,
                    reason,
                    will_retry,
                },
            );
            if !will_retry {
                return outcome;
            }

            tracing::warn!(role = %role.name, attempt, %reason, "retrying role export");

            // A cancellation during the pause finalizes this role with the
            // attempts already made.
            tokio::select! {
                _ = tokio::time::sleep(self.retry.backoff) => {}
                _ = cancel.cancelled() => return outcome,
            }
            attempt += 1;
        }
    }
}
