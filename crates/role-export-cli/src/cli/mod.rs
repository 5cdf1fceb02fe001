// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommand implementations for the role-export binary.

pub mod doctor;
pub mod export_cmd;
pub mod output;
pub mod verify_cmd;

use clap::Args;

/// Where to connect and with which session.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// LMS base URL (e.g. "https://lms.example.edu")
    #[arg(long, env = "ROLE_EXPORT_HOST")]
    pub host: String,

    /// Session cookie header copied from a logged-in browser
    #[arg(long, env = "ROLE_EXPORT_COOKIE", hide_env_values = true)]
    pub cookie: String,
}
