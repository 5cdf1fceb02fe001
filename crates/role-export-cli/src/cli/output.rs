// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Human vs. machine output.

use serde::Serialize;

/// Global output flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    /// Whether human-readable progress should be drawn.
    pub fn interactive(&self) -> bool {
        !self.json && !self.quiet
    }
}

/// Pretty-print a JSON value to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("  Error: failed to serialize output: {e}"),
    }
}
