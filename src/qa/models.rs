//! Data model shared by the reviewer, the fixer, and the QA loop driver.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaIssue {
    pub title: String,
    pub severity: Severity,
    pub description: String,
    pub location: Option<String>,
    pub fix_required: bool,
    pub category: CheckCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Syntax,
    Style,
    Security,
    Performance,
    Correctness,
    SpecAlignment,
    BreakingChange,
    TestCoverage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewCheck {
    pub name: String,
    pub category: CheckCategory,
    pub description: String,
    pub pattern: Option<String>,
    pub file_globs: Vec<String>,
    pub severity: Severity,
    pub enabled: bool,
}

/// The built-in review checks run on every iteration unless explicitly
/// disabled by configuration.
pub fn default_checks() -> Vec<ReviewCheck> {
    let mk = |name: &str, category: CheckCategory, description: &str, severity: Severity| ReviewCheck {
        name: name.to_string(),
        category,
        description: description.to_string(),
        pattern: None,
        file_globs: vec!["**/*".to_string()],
        severity,
        enabled: true,
    };

    vec![
        mk("compiles", CheckCategory::Syntax, "Code must compile without errors", Severity::Critical),
        mk("no-debug-prints", CheckCategory::Style, "No leftover debug print statements", Severity::Low),
        mk("no-hardcoded-secrets", CheckCategory::Security, "No hardcoded credentials or API keys", Severity::Critical),
        mk("no-sql-injection", CheckCategory::Security, "No string-concatenated SQL queries", Severity::Critical),
        mk("no-n-plus-one", CheckCategory::Performance, "No obvious N+1 query patterns", Severity::Medium),
        mk("error-handling", CheckCategory::Correctness, "Fallible operations handle their errors", Severity::High),
        mk("matches-spec", CheckCategory::SpecAlignment, "Implementation matches the written spec", Severity::High),
        mk("no-breaking-api-change", CheckCategory::BreakingChange, "No unannounced breaking API changes", Severity::High),
        mk("has-test-coverage", CheckCategory::TestCoverage, "New logic has corresponding tests", Severity::Medium),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReviewResult {
    pub passed: bool,
    pub issues: Vec<QaIssue>,
    pub warnings: Vec<String>,
    pub files_reviewed: Vec<String>,
    pub checks_performed: Vec<String>,
    pub duration_ms: u64,
    pub breaking_changes_detected: bool,
    pub test_results: TestResults,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TestResults {
    pub unit_passed: u32,
    pub unit_total: u32,
    pub integration_passed: u32,
    pub integration_total: u32,
    pub e2e_passed: u32,
    pub e2e_total: u32,
}

impl TestResults {
    /// Renders as the compact "p/t" form used in persisted signoff records,
    /// e.g. `"42/45"` for unit tests.
    pub fn unit_summary(&self) -> String {
        format!("{}/{}", self.unit_passed, self.unit_total)
    }
    pub fn integration_summary(&self) -> String {
        format!("{}/{}", self.integration_passed, self.integration_total)
    }
    pub fn e2e_summary(&self) -> String {
        format!("{}/{}", self.e2e_passed, self.e2e_total)
    }

    pub fn all_passed(&self) -> bool {
        self.unit_passed == self.unit_total
            && self.integration_passed == self.integration_total
            && self.e2e_passed == self.e2e_total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignoffStatus {
    Pending,
    Approved,
    Rejected,
    FixesApplied,
    Error,
}

/// Persisted under `qa_signoff` in `implementation_plan.json`. `qa_session` is
/// non-decreasing across a QA Loop run's iterations; a Fixer pass that applies
/// fixes without a fresh Review does not advance it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaSignoff {
    pub status: SignoffStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub qa_session: u32,
    pub issues_found: Vec<QaIssue>,
    pub test_results: TestResults,
    pub verified_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_for_qa_revalidation: Option<bool>,
}

impl QaSignoff {
    pub fn new(
        status: SignoffStatus,
        qa_session: u32,
        issues_found: Vec<QaIssue>,
        test_results: TestResults,
        verified_by: impl Into<String>,
    ) -> Self {
        Self {
            status,
            timestamp: chrono::Utc::now(),
            qa_session,
            issues_found,
            test_results,
            verified_by: verified_by.into(),
            ready_for_qa_revalidation: None,
        }
    }

    pub fn with_ready_for_revalidation(mut self, ready: bool) -> Self {
        self.ready_for_qa_revalidation = Some(ready);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStrategy {
    Replace,
    Insert,
    Delete,
    Refactor,
    Manual,
}

impl FixStrategy {
    /// `Delete` removes code and so may carry no replacement; every other
    /// strategy needs a non-empty `fixed_code` before it can be applied.
    pub fn validate(self, fixed_code: Option<&str>) -> bool {
        match self {
            FixStrategy::Delete => true,
            _ => fixed_code.is_some_and(|code| !code.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedFix {
    pub issue_title: String,
    pub strategy: FixStrategy,
    pub file: String,
    /// 1-based line number the fix applies at, when known. `None` means the
    /// fix could not be localized and must be appended rather than spliced.
    pub line: Option<usize>,
    pub original_code: Option<String>,
    /// Required for every strategy except `Delete`, which removes code
    /// entirely and so has nothing to replace it with.
    pub fixed_code: Option<String>,
    pub confidence: f64,
}

impl ProposedFix {
    /// `base 0.8 (0.3 if Manual, 0.5 if Refactor) × 0.7 if Critical, × 0.8 if
    /// High, else unscaled`, rounded to 2 decimals.
    pub fn confidence_for(strategy: FixStrategy, severity: Severity) -> f64 {
        let base = match strategy {
            FixStrategy::Manual => 0.3,
            FixStrategy::Refactor => 0.5,
            _ => 0.8,
        };
        let scaled = match severity {
            Severity::Critical => base * 0.7,
            Severity::High => base * 0.8,
            _ => base,
        };
        (scaled * 100.0).round() / 100.0
    }

    pub fn should_auto_apply(&self, auto_apply: bool, min_confidence: f64) -> bool {
        auto_apply
            && self.strategy != FixStrategy::Manual
            && self.strategy != FixStrategy::Refactor
            && self.confidence >= min_confidence
    }
}
