// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Probe the session without exporting anything.

use super::output::{self, Output};
use super::SessionArgs;
use anyhow::{bail, Result};
use role_export::{AuthStatus, ExportConfig, Pipeline, SessionContext};

pub async fn run(args: SessionArgs, out: Output) -> Result<()> {
    let session = SessionContext::new(&args.host, &args.cookie)?;
    let pipeline = Pipeline::new(ExportConfig::from_env());
    let status = pipeline.verify(&session).await?;

    // A rejection is reported once, by the caller's error path.
    let user = accepted_user(session.host(), status)?;
    if out.json {
        output::print_json(&serde_json::json!({
            "host": session.host(),
            "authenticated": true,
            "user": user,
        }));
    } else {
        println!("[OK] Session accepted by {} ({user})", session.host());
    }
    Ok(())
}

fn accepted_user(host: &str, status: AuthStatus) -> Result<String> {
    match status {
        AuthStatus::Authenticated { user } => Ok(user),
        AuthStatus::Unauthenticated { status } => {
            bail!("session rejected by {host} (HTTP {status})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_user() {
        let user = accepted_user(
            "https://lms.example.edu",
            AuthStatus::Authenticated {
                user: "Ada Admin".into(),
            },
        )
        .unwrap();
        assert_eq!(user, "Ada Admin");
    }

    #[test]
    fn test_rejection_is_a_single_error() {
        let err = accepted_user(
            "https://lms.example.edu",
            AuthStatus::Unauthenticated { status: 401 },
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "session rejected by https://lms.example.edu (HTTP 401)"
        );
    }
}
