// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Role export library: bulk extraction of role permission reports.
//!
//! Given an already-authenticated session to a learning-management-system
//! tenant, the pipeline enumerates every role of an org unit, drives one
//! browser context through each role's permission export, and packages the
//! exported files into a single in-memory zip archive.
//!
//! Components, leaves first: [`session`], [`discovery`], [`extractor`],
//! [`coordinator`], [`archive`]. [`pipeline`] wires them together.

pub mod archive;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod http_client;
pub mod pipeline;
pub mod progress;
pub mod renderer;
pub mod report;
pub mod session;

pub use archive::{archive_file_name, build as build_archive};
pub use config::ExportConfig;
pub use coordinator::{Coordinator, RetryPolicy};
pub use discovery::{RoleDescriptor, RoleSelection};
pub use error::{ExportError, ExportResult, FailureKind};
pub use extractor::RoleExtractor;
pub use pipeline::Pipeline;
pub use report::{ExtractionOutcome, RunReport};
pub use session::{AuthStatus, SessionContext};
