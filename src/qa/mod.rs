//! QA loop: static review checks feeding an iterative fix loop, with
//! recurring-issue and consecutive-error escalation to a human.

pub mod error;
pub mod fixer;
pub mod loop_driver;
pub mod models;
pub mod reviewer;
pub mod signoff;
pub mod test_runner;

pub use error::QaError;
pub use fixer::AutoFixer;
pub use loop_driver::{escalation_report_path, IterationRecord, NoopProgress, QaLoop, QaLoopOutcome, QaPhase, QaProgress};
pub use models::{
    default_checks, CheckCategory, FixStrategy, ProposedFix, QaIssue, QaSignoff, ReviewCheck,
    ReviewResult, Severity, SignoffStatus, TestResults,
};
pub use reviewer::StaticReviewer;
pub use test_runner::{detect_framework, run_tests, TestFramework};
