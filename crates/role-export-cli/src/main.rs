// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

mod cli;

#[derive(Parser)]
#[command(
    name = "role-export",
    about = "Bulk export of LMS role permission reports",
    version,
    after_help = "Run 'role-export <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress progress output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export every role's permission report into one zip archive
    Export(cli::export_cmd::ExportArgs),
    /// Check that the session cookie is accepted by the host
    Verify(cli::SessionArgs),
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let out = cli::output::Output {
        json: cli.json,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Commands::Export(args) => cli::export_cmd::run(args, out).await,
        Commands::Verify(args) => cli::verify_cmd::run(args, out).await,
        Commands::Doctor => cli::doctor::run(out).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "role-export", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if out.json {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        } else {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_args() {
        let cli = Cli::try_parse_from([
            "role-export",
            "--json",
            "export",
            "--host",
            "https://lms.example.edu",
            "--cookie",
            "d2lSessionVal=abc",
            "--org-unit",
            "1234",
            "--exclude",
            "Guest",
            "--exclude",
            "D2LMonitor",
            "--no-timestamp",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.session.host, "https://lms.example.edu");
                assert_eq!(args.org_unit, 1234);
                assert_eq!(args.exclude, vec!["Guest", "D2LMonitor"]);
                assert!(args.no_timestamp);
                assert!(args.only.is_empty());
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_export_defaults() {
        let cli = Cli::try_parse_from([
            "role-export",
            "export",
            "--host",
            "https://lms.example.edu",
            "--cookie",
            "x=1",
        ])
        .unwrap();

        assert_eq!(cli.log_level, "warn");
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.org_unit, 6606);
                assert_eq!(args.output, std::path::PathBuf::from("."));
                assert!(args.max_attempts.is_none());
            }
            _ => panic!("expected export"),
        }
    }
}
