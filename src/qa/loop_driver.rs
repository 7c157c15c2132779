//! The Review→Fix iteration loop: keeps asking the reviewer for issues and
//! the fixer to resolve them until the review passes clean, a human
//! escalation is warranted, or the iteration cap is hit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::qa::error::QaError;
use crate::qa::models::{QaIssue, QaSignoff, ReviewResult, Severity, SignoffStatus, TestResults};
use crate::qa::signoff::persist_signoff;

const DEFAULT_MAX_ITERATIONS: u32 = 50;
const RECURRING_ISSUE_THRESHOLD: u32 = 3;
const CONSECUTIVE_ERROR_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaPhase {
    Review,
    Fix,
    Complete,
    Failed,
}

#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, worktree: &Path) -> Result<ReviewResult, QaError>;
}

#[async_trait]
pub trait Fixer: Send + Sync {
    /// Attempts to resolve `issues` in place; returns the subset that were
    /// actually addressed (the rest remain open for the next review pass).
    async fn fix(&self, worktree: &Path, issues: &[QaIssue]) -> Result<Vec<String>, QaError>;
}

/// Non-blocking progress hooks a caller can use to drive a CLI spinner or a
/// session's conversation log without the loop itself knowing about either.
pub trait QaProgress: Send + Sync {
    fn on_iteration_start(&self, _iteration: u32) {}
    fn on_iteration_end(&self, _iteration: u32, _result: &ReviewResult) {}
    fn on_phase_change(&self, _phase: QaPhase) {}
}

pub struct NoopProgress;
impl QaProgress for NoopProgress {}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IterationRecord {
    pub iteration: u32,
    pub issues: Vec<QaIssue>,
    pub fixed_titles: Vec<String>,
    pub errored: bool,
}

pub struct QaLoopOutcome {
    pub phase: QaPhase,
    pub iterations: Vec<IterationRecord>,
    pub escalation_report: Option<String>,
}

pub struct QaLoop {
    reviewer: Box<dyn Reviewer>,
    fixer: Box<dyn Fixer>,
    max_iterations: u32,
}

impl QaLoop {
    pub fn new(reviewer: Box<dyn Reviewer>, fixer: Box<dyn Fixer>) -> Self {
        Self {
            reviewer,
            fixer,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// A human-authored `QA_FIX_REQUEST.md` left in the worktree is treated
    /// as an extra manual issue injected into the next review pass, letting
    /// a person redirect the loop without restarting it.
    async fn consume_fix_request(worktree: &Path) -> Option<QaIssue> {
        let path = worktree.join("QA_FIX_REQUEST.md");
        let content = tokio::fs::read_to_string(&path).await.ok()?;
        let _ = tokio::fs::remove_file(&path).await;
        Some(QaIssue {
            title: "human fix request".to_string(),
            severity: Severity::High,
            description: content,
            location: None,
            fix_required: true,
            category: crate::qa::models::CheckCategory::SpecAlignment,
        })
    }

    fn detect_recurring_issues(history: &[IterationRecord]) -> Vec<String> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for record in history {
            for issue in &record.issues {
                *counts.entry(issue.title.clone()).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n >= RECURRING_ISSUE_THRESHOLD)
            .map(|(title, _)| title)
            .collect()
    }

    fn escalation_report(
        spec_slug: &str,
        history: &[IterationRecord],
        reason: &str,
    ) -> String {
        let recurring = Self::detect_recurring_issues(history);
        let mut report = format!("# QA Escalation: {spec_slug}\n\nReason: {reason}\n\n");
        report.push_str(&format!("Iterations run: {}\n\n", history.len()));
        if !recurring.is_empty() {
            report.push_str("## Recurring issues\n");
            for title in &recurring {
                report.push_str(&format!("- {title}\n"));
            }
        }
        report
    }

    /// Persists a `QaSignoff` record into `<spec_dir>/implementation_plan.json`.
    /// Persistence failures are logged, not propagated — a sign-off write
    /// failing must never unwind an otherwise-successful QA verdict.
    async fn record_signoff(
        spec_dir: &Path,
        status: SignoffStatus,
        qa_session: u32,
        issues_found: Vec<QaIssue>,
        test_results: TestResults,
        ready_for_qa_revalidation: Option<bool>,
    ) {
        let mut signoff = QaSignoff::new(status, qa_session, issues_found, test_results, "qa-loop");
        if let Some(ready) = ready_for_qa_revalidation {
            signoff = signoff.with_ready_for_revalidation(ready);
        }
        if let Err(e) = persist_signoff(spec_dir, &signoff).await {
            warn!("failed to persist qa signoff: {}", e);
        }
    }

    /// Writes the escalation report to `QA_ESCALATION.md` in the worktree so
    /// a human reviewing the worktree sees it without digging through logs.
    async fn write_escalation_report(worktree: &Path, report: &str) {
        let path = escalation_report_path(worktree);
        if let Err(e) = tokio::fs::write(&path, report).await {
            warn!("failed to write escalation report to {:?}: {}", path, e);
        }
    }

    /// Drives the Review→Fix loop to completion, failure, or escalation.
    pub async fn run(
        &self,
        spec_slug: &str,
        worktree: &Path,
        spec_dir: &Path,
        progress: &dyn QaProgress,
    ) -> Result<QaLoopOutcome, QaError> {
        let mut history = Vec::new();
        let mut consecutive_errors = 0u32;

        for iteration in 1..=self.max_iterations {
            progress.on_iteration_start(iteration);
            progress.on_phase_change(QaPhase::Review);

            let review = match self.reviewer.review(worktree).await {
                Ok(r) => {
                    consecutive_errors = 0;
                    r
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!("review failed on iteration {}: {}", iteration, e);
                    history.push(IterationRecord {
                        iteration,
                        errored: true,
                        ..Default::default()
                    });
                    if consecutive_errors >= CONSECUTIVE_ERROR_THRESHOLD {
                        let report = Self::escalation_report(
                            spec_slug,
                            &history,
                            "reviewer errored on 3 consecutive iterations",
                        );
                        Self::write_escalation_report(worktree, &report).await;
                        Self::record_signoff(
                            spec_dir,
                            SignoffStatus::Error,
                            iteration,
                            Vec::new(),
                            TestResults::default(),
                            None,
                        )
                        .await;
                        return Ok(QaLoopOutcome {
                            phase: QaPhase::Failed,
                            iterations: history,
                            escalation_report: Some(report),
                        });
                    }
                    continue;
                }
            };

            let mut issues = review.issues.clone();
            if let Some(manual) = Self::consume_fix_request(worktree).await {
                issues.push(manual);
            }

            progress.on_iteration_end(iteration, &review);

            if review.passed && issues.is_empty() {
                info!("QA loop for '{}' passed clean after {} iteration(s)", spec_slug, iteration);
                history.push(IterationRecord {
                    iteration,
                    issues: Vec::new(),
                    fixed_titles: Vec::new(),
                    errored: false,
                });
                Self::record_signoff(
                    spec_dir,
                    SignoffStatus::Approved,
                    iteration,
                    Vec::new(),
                    review.test_results,
                    Some(true),
                )
                .await;
                return Ok(QaLoopOutcome {
                    phase: QaPhase::Complete,
                    iterations: history,
                    escalation_report: None,
                });
            }

            progress.on_phase_change(QaPhase::Fix);
            let fixed_titles = self.fixer.fix(worktree, &issues).await?;

            Self::record_signoff(
                spec_dir,
                if fixed_titles.is_empty() {
                    SignoffStatus::Rejected
                } else {
                    SignoffStatus::FixesApplied
                },
                iteration,
                issues.clone(),
                review.test_results.clone(),
                Some(false),
            )
            .await;

            history.push(IterationRecord {
                iteration,
                issues,
                fixed_titles,
                errored: false,
            });

            let recurring = Self::detect_recurring_issues(&history);
            if !recurring.is_empty() {
                let report = Self::escalation_report(
                    spec_slug,
                    &history,
                    &format!("issue(s) recurred {RECURRING_ISSUE_THRESHOLD}+ times: {recurring:?}"),
                );
                Self::write_escalation_report(worktree, &report).await;
                Self::record_signoff(
                    spec_dir,
                    SignoffStatus::Error,
                    iteration,
                    Vec::new(),
                    TestResults::default(),
                    None,
                )
                .await;
                return Ok(QaLoopOutcome {
                    phase: QaPhase::Failed,
                    iterations: history,
                    escalation_report: Some(report),
                });
            }
        }

        let report = Self::escalation_report(spec_slug, &history, "hit the hard iteration cap");
        Self::write_escalation_report(worktree, &report).await;
        Self::record_signoff(
            spec_dir,
            SignoffStatus::Error,
            self.max_iterations,
            Vec::new(),
            TestResults::default(),
            None,
        )
        .await;
        Ok(QaLoopOutcome {
            phase: QaPhase::Failed,
            iterations: history,
            escalation_report: Some(report),
        })
    }
}

pub fn escalation_report_path(worktree: &Path) -> PathBuf {
    worktree.join("QA_ESCALATION.md")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qa::models::CheckCategory;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyReviewer {
        calls: Arc<AtomicU32>,
        issue_title: &'static str,
    }

    #[async_trait]
    impl Reviewer for FlakyReviewer {
        async fn review(&self, _worktree: &Path) -> Result<ReviewResult, QaError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ReviewResult {
                passed: n >= 2,
                issues: if n >= 2 {
                    Vec::new()
                } else {
                    vec![QaIssue {
                        title: self.issue_title.to_string(),
                        severity: Severity::Medium,
                        description: "same issue every time".to_string(),
                        location: None,
                        fix_required: true,
                        category: CheckCategory::Correctness,
                    }]
                },
                ..Default::default()
            })
        }
    }

    struct NoopFixer;
    #[async_trait]
    impl Fixer for NoopFixer {
        async fn fix(&self, _worktree: &Path, issues: &[QaIssue]) -> Result<Vec<String>, QaError> {
            Ok(issues.iter().map(|i| i.title.clone()).collect())
        }
    }

    #[tokio::test]
    async fn loop_completes_once_review_passes() {
        let calls = Arc::new(AtomicU32::new(0));
        let reviewer = FlakyReviewer {
            calls: calls.clone(),
            issue_title: "flaky",
        };
        let qa_loop = QaLoop::new(Box::new(reviewer), Box::new(NoopFixer));
        let spec_dir = tempfile::tempdir().unwrap();
        let outcome = qa_loop
            .run("demo", Path::new("/tmp/demo"), spec_dir.path(), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(outcome.phase, QaPhase::Complete);

        let plan = std::fs::read_to_string(spec_dir.path().join("implementation_plan.json")).unwrap();
        let plan: serde_json::Value = serde_json::from_str(&plan).unwrap();
        assert_eq!(plan["qa_signoff"]["status"], serde_json::json!("approved"));
    }

    struct AlwaysSameIssue;
    #[async_trait]
    impl Reviewer for AlwaysSameIssue {
        async fn review(&self, _worktree: &Path) -> Result<ReviewResult, QaError> {
            Ok(ReviewResult {
                passed: false,
                issues: vec![QaIssue {
                    title: "stuck".to_string(),
                    severity: Severity::High,
                    description: "never resolved".to_string(),
                    location: None,
                    fix_required: true,
                    category: CheckCategory::Correctness,
                }],
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn loop_escalates_on_recurring_issue() {
        let qa_loop = QaLoop::new(Box::new(AlwaysSameIssue), Box::new(NoopFixer)).with_max_iterations(10);
        let worktree = tempfile::tempdir().unwrap();
        let spec_dir = tempfile::tempdir().unwrap();
        let outcome = qa_loop
            .run("demo", worktree.path(), spec_dir.path(), &NoopProgress)
            .await
            .unwrap();
        assert_eq!(outcome.phase, QaPhase::Failed);
        assert!(outcome.escalation_report.is_some());
        assert!(outcome.iterations.len() <= RECURRING_ISSUE_THRESHOLD as usize + 1);
        assert!(worktree.path().join("QA_ESCALATION.md").exists());
    }
}
