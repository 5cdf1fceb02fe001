// Copyright 2026 Role Export Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-role outcomes and the run report that aggregates them.

use crate::discovery::RoleDescriptor;
use crate::error::FailureKind;
use serde::{Deserialize, Serialize};

/// Final (or single-attempt) result for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success {
        role: RoleDescriptor,
        /// Archive entry name before collision adjustment.
        content_name: String,
        #[serde(skip)]
        content: Vec<u8>,
        attempts: u32,
    },
    Failure {
        role: RoleDescriptor,
        reason: FailureKind,
        attempts: u32,
    },
}

/// Outcome without payload, for progress events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Succeeded,
    Failed(FailureKind),
}

impl ExtractionOutcome {
    pub fn role(&self) -> &RoleDescriptor {
        match self {
            Self::Success { role, .. } | Self::Failure { role, .. } => role,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success { .. } => OutcomeKind::Succeeded,
            Self::Failure { reason, .. } => OutcomeKind::Failed(*reason),
        }
    }

    /// The same outcome with its attempt count replaced.
    pub fn with_attempts(mut self, n: u32) -> Self {
        match &mut self {
            Self::Success { attempts, .. } | Self::Failure { attempts, .. } => *attempts = n,
        }
        self
    }
}

/// One row of the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    pub role: String,
    pub id: String,
    pub status: String,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything one run produced, in discovery order.
///
/// Every role handed to the coordinator appears exactly once: either in
/// `outcomes` or, after cancellation, in `unprocessed`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub total_roles: usize,
    pub outcomes: Vec<ExtractionOutcome>,
    pub unprocessed: Vec<RoleDescriptor>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// `(content name, bytes)` of every success, in report order.
    pub fn successes(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.outcomes.iter().filter_map(|o| match o {
            ExtractionOutcome::Success {
                content_name,
                content,
                ..
            } => Some((content_name.as_str(), content.as_slice())),
            ExtractionOutcome::Failure { .. } => None,
        })
    }

    pub fn log_rows(&self) -> Vec<LogRow> {
        let finished = self.outcomes.iter().map(|o| LogRow {
            role: o.role().name.clone(),
            id: o.role().id.clone(),
            status: match o {
                ExtractionOutcome::Success { .. } => "OK".to_string(),
                ExtractionOutcome::Failure { .. } => "Failed".to_string(),
            },
            attempts: o.attempts(),
            error: match o {
                ExtractionOutcome::Failure { reason, .. } => Some(reason.to_string()),
                ExtractionOutcome::Success { .. } => None,
            },
        });
        let skipped = self.unprocessed.iter().map(|role| LogRow {
            role: role.name.clone(),
            id: role.id.clone(),
            status: "Skipped".to_string(),
            attempts: 0,
            error: None,
        });
        finished.chain(skipped).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(id: &str, name: &str) -> ExtractionOutcome {
        ExtractionOutcome::Success {
            role: RoleDescriptor::new(id, name),
            content_name: format!("{name}_{id}.txt"),
            content: b"perm".to_vec(),
            attempts: 1,
        }
    }

    fn report() -> RunReport {
        RunReport {
            run_id: "run-1".into(),
            total_roles: 4,
            outcomes: vec![
                success("1", "A"),
                ExtractionOutcome::Failure {
                    role: RoleDescriptor::new("2", "B"),
                    reason: FailureKind::NavigationTimeout,
                    attempts: 3,
                },
                success("3", "C"),
            ],
            unprocessed: vec![RoleDescriptor::new("4", "D")],
            cancelled: true,
            elapsed_ms: 10,
        }
    }

    #[test]
    fn test_counts() {
        let r = report();
        assert_eq!(r.succeeded(), 2);
        assert_eq!(r.failed(), 1);
        assert_eq!(r.successes().map(|(n, _)| n).collect::<Vec<_>>(), vec!["A_1.txt", "C_3.txt"]);
    }

    #[test]
    fn test_with_attempts() {
        let o = success("1", "A").with_attempts(2);
        assert_eq!(o.attempts(), 2);
        assert_eq!(o.kind(), OutcomeKind::Succeeded);
    }

    #[test]
    fn test_log_rows_include_skipped() {
        let rows = report().log_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].status, "Failed");
        assert_eq!(rows[1].error.as_deref(), Some("navigation timed out"));
        assert_eq!(rows[3].status, "Skipped");
        assert_eq!(rows[3].attempts, 0);
    }

    #[test]
    fn test_report_json_omits_content() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "success");
        assert!(json["outcomes"][0].get("content").is_none());
        assert_eq!(json["outcomes"][1]["reason"], "NavigationTimeout");
    }
}
