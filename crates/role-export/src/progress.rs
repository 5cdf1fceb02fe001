// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress events for live rendering of a run.
//!
//! The coordinator emits `ProgressEvent`s through an unbounded
//! `tokio::sync::mpsc` channel to a single observer, in the order roles
//! finish. When the observer has gone away, events are silently dropped.

use crate::error::FailureKind;
use crate::report::OutcomeKind;
use serde::{Deserialize, Serialize};

/// A progress event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// Extraction is about to start.
    RunStarted { total_roles: usize },
    /// One attempt for a role failed.
    AttemptFailed {
        role: String,
        attempt: u32,
        reason: FailureKind,
        will_retry: bool,
    },
    /// A role's outcome is final. `index` is 1-based.
    RoleFinished {
        index: usize,
        total: usize,
        role: String,
        outcome: OutcomeKind,
    },
    /// All roles are finalized.
    RunFinished {
        succeeded: usize,
        failed: usize,
        elapsed_ms: u64,
    },
    /// The run stopped early at the caller's request.
    RunCancelled { processed: usize, remaining: usize },
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::mpsc::UnboundedSender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>;

/// Create a new progress channel.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// Emit a progress event, silently ignoring send errors (which occur when
/// the observer has hung up).
pub fn emit(tx: &Option<ProgressSender>, run_id: &str, seq: &mut u64, event: ProgressEventKind) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            event,
        });
    }
}
