// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Environment readiness check.

use super::output::{self, Output};
use anyhow::Result;
use role_export::renderer::chromium::find_chromium;
use role_export::ExportConfig;

/// Check browser availability and the effective configuration.
pub async fn run(out: Output) -> Result<()> {
    let config = ExportConfig::from_env();
    let chromium = find_chromium(config.chromium_path.as_ref());
    let cookie_set = std::env::var_os("ROLE_EXPORT_COOKIE").is_some();

    if out.json {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "cookie_from_env": cookie_set,
            "config": config,
            "ready": chromium.is_some(),
        }));
        return Ok(());
    }

    println!("Role Export Doctor");
    println!("==================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome/Chromium or set ROLE_EXPORT_CHROMIUM_PATH."
        ),
    }
    if cookie_set {
        println!("[OK] ROLE_EXPORT_COOKIE is set");
    } else {
        println!("[--] ROLE_EXPORT_COOKIE not set (pass --cookie instead)");
    }
    println!(
        "[OK] Timeouts: navigation {}ms, control {}ms, download {}ms",
        config.navigation_timeout_ms, config.control_timeout_ms, config.download_timeout_ms
    );
    println!(
        "[OK] Retries: {} attempts per role, {}ms apart",
        config.max_attempts, config.retry_backoff_ms
    );

    println!();
    if chromium.is_some() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
