// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! `role-export export`: run the pipeline and write the archive plus its log.

use super::output::{self, Output};
use super::SessionArgs;
use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use role_export::progress::{self, ProgressEventKind, ProgressReceiver};
use role_export::renderer::chromium::ChromiumRenderer;
use role_export::report::OutcomeKind;
use role_export::{
    archive_file_name, build_archive, ExportConfig, Pipeline, RoleSelection, RunReport,
    SessionContext,
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Org unit whose roles are exported
    #[arg(long, default_value = "6606")]
    pub org_unit: u64,

    /// Directory for the archive and its log
    #[arg(long, short, default_value = ".")]
    pub output: PathBuf,

    /// Role display name to skip. Can be repeated. Defaults to D2LMonitor.
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Export only these role display names. Can be repeated.
    #[arg(long)]
    pub only: Vec<String>,

    /// Omit the timestamp from the archive name
    #[arg(long)]
    pub no_timestamp: bool,

    /// Attempts per role, including the first
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Do not fall back to the direct export page when Export is missing
    #[arg(long)]
    pub no_direct_export: bool,

    /// Chromium binary to drive
    #[arg(long, env = "ROLE_EXPORT_CHROMIUM_PATH")]
    pub chromium: Option<PathBuf>,
}

impl ExportArgs {
    fn config(&self) -> ExportConfig {
        let mut config = ExportConfig::from_env();
        if let Some(n) = self.max_attempts {
            config.max_attempts = n.max(1);
        }
        if self.no_direct_export {
            config.direct_export_fallback = false;
        }
        if self.chromium.is_some() {
            config.chromium_path = self.chromium.clone();
        }
        config
    }

    fn selection(&self) -> RoleSelection {
        let mut selection = RoleSelection::default();
        if !self.exclude.is_empty() {
            selection.exclude = self.exclude.clone();
        }
        if !self.only.is_empty() {
            selection.include = Some(self.only.clone());
        }
        selection
    }
}

pub async fn run(args: ExportArgs, out: Output) -> Result<()> {
    let config = args.config();
    let session = SessionContext::new(&args.session.host, &args.session.cookie)?;
    let netloc = session.netloc();

    tokio::fs::create_dir_all(&args.output)
        .await
        .with_context(|| format!("cannot create {}", args.output.display()))?;

    let renderer = ChromiumRenderer::launch(&config).await?;

    let (tx, rx) = progress::channel();
    let progress_task = tokio::spawn(render_progress(rx, out.interactive()));

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("  Cancelling after the current role...");
                cancel.cancel();
            }
        })
    };

    let pipeline = Pipeline::new(config).with_selection(args.selection());
    let result = pipeline
        .run(session, args.org_unit, &renderer, Some(tx), cancel)
        .await;
    ctrl_c.abort();
    let _ = progress_task.await;
    let report = result?;

    let timestamp = (!args.no_timestamp).then(chrono::Local::now);
    let file_name = archive_file_name(&netloc, args.org_unit, timestamp);
    let archive_path = args.output.join(&file_name);
    let log_path = log_path_for(&archive_path);

    let archive = build_archive(&report)?;
    tokio::fs::write(&archive_path, &archive)
        .await
        .with_context(|| format!("cannot write {}", archive_path.display()))?;
    let log = serde_json::to_vec_pretty(&report.log_rows())?;
    tokio::fs::write(&log_path, log)
        .await
        .with_context(|| format!("cannot write {}", log_path.display()))?;

    tracing::info!(
        archive = %archive_path.display(),
        bytes = archive.len(),
        "archive written"
    );

    if out.json {
        output::print_json(&serde_json::json!({
            "archive": archive_path.display().to_string(),
            "log": log_path.display().to_string(),
            "archive_bytes": archive.len(),
            "report": report,
        }));
    } else if !out.quiet {
        print_summary(&report, &archive_path, &log_path);
    }

    Ok(())
}

/// `<stem>_log.json` next to the archive.
fn log_path_for(archive: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "roles".to_string());
    archive.with_file_name(format!("{stem}_log.json"))
}

async fn render_progress(mut rx: ProgressReceiver, visible: bool) {
    let bar = if visible {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::with_template(
        "  {spinner} [{bar:30}] {pos}/{len} {msg} (eta {eta})",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }

    let (mut ok, mut failed) = (0usize, 0usize);
    while let Some(event) = rx.recv().await {
        match event.event {
            ProgressEventKind::RunStarted { total_roles } => {
                bar.set_length(total_roles as u64);
            }
            ProgressEventKind::AttemptFailed {
                role,
                attempt,
                reason,
                will_retry: true,
            } => {
                bar.println(format!("  [..] {role}: attempt {attempt} {reason}, retrying"));
            }
            ProgressEventKind::AttemptFailed { .. } => {}
            ProgressEventKind::RoleFinished { role, outcome, .. } => {
                match outcome {
                    OutcomeKind::Succeeded => ok += 1,
                    OutcomeKind::Failed(reason) => {
                        failed += 1;
                        bar.println(format!("  [!!] {role}: {reason}"));
                    }
                }
                bar.inc(1);
                bar.set_message(format!("ok {ok} / failed {failed}"));
            }
            ProgressEventKind::RunFinished { .. } | ProgressEventKind::RunCancelled { .. } => {
                bar.finish_and_clear();
            }
        }
    }
    bar.finish_and_clear();
}

fn print_summary(report: &RunReport, archive: &Path, log: &Path) {
    println!();
    if report.cancelled {
        println!(
            "  Cancelled: {} of {} roles processed",
            report.outcomes.len(),
            report.total_roles
        );
    }
    println!(
        "  Exported {} / {} roles in {:.1}s",
        report.succeeded(),
        report.total_roles,
        report.elapsed_ms as f64 / 1000.0
    );
    for row in report.log_rows().iter().filter(|r| r.status != "OK") {
        match &row.error {
            Some(err) => println!("  [!!] {} ({}): {err}", row.role, row.id),
            None => println!("  [--] {} ({}): {}", row.role, row.id, row.status),
        }
    }
    println!("  Archive: {}", archive.display());
    println!("  Log:     {}", log.display());
}
