//! Generates [`ProposedFix`]es from review issues and applies the ones the
//! confidence gate allows; everything else gets written to
//! `QA_FIX_REQUEST.md` for a human to pick up.

use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use crate::qa::error::QaError;
use crate::qa::loop_driver::Fixer as FixerTrait;
use crate::qa::models::{FixStrategy, ProposedFix, QaIssue, Severity};

/// Maps a known issue title to the strategy and human-facing description
/// used when no agent is available to propose something smarter.
fn fix_pattern(issue_title: &str) -> (FixStrategy, &'static str) {
    match issue_title {
        t if t.contains("hardcoded secrets") => {
            (FixStrategy::Replace, "move the secret into configuration or an environment variable")
        }
        t if t.contains("debug prints") => (FixStrategy::Delete, "remove the debug print statement"),
        t if t.contains("sql injection") => {
            (FixStrategy::Refactor, "use a parameterized query instead of string concatenation")
        }
        t if t.contains("n plus one") => {
            (FixStrategy::Refactor, "batch the query instead of issuing one per item")
        }
        t if t.contains("error handling") => {
            (FixStrategy::Insert, "propagate or handle the error instead of discarding it")
        }
        _ => (FixStrategy::Manual, "needs manual review"),
    }
}

fn parse_location(location: Option<&str>) -> (Option<String>, Option<usize>) {
    let Some(location) = location else {
        return (None, None);
    };
    match location.rsplit_once(':') {
        Some((file, line)) => (Some(file.to_string()), line.parse().ok()),
        None => (Some(location.to_string()), None),
    }
}

async fn read_line(worktree: &Path, file: &str, line_number: usize) -> Option<String> {
    let content = tokio::fs::read_to_string(worktree.join(file)).await.ok()?;
    content.lines().nth(line_number.checked_sub(1)?).map(str::to_string)
}

/// Generates a [`ProposedFix`] for a single issue, reading the offending
/// line from disk (if the issue carries a `file:line` location) to populate
/// `original_code`.
pub async fn propose_fix(worktree: &Path, issue: &QaIssue) -> ProposedFix {
    let (strategy, description) = fix_pattern(&issue.title);
    let (file, line_number) = parse_location(issue.location.as_deref());

    let original_code = match (&file, line_number) {
        (Some(f), Some(l)) => read_line(worktree, f, l).await,
        _ => None,
    };

    let fixed_code = match (strategy, &original_code) {
        (FixStrategy::Delete, _) => None,
        (FixStrategy::Manual, _) => None,
        (_, Some(original)) => Some(apply_template(strategy, original)),
        (_, None) => None,
    };

    ProposedFix {
        issue_title: issue.title.clone(),
        strategy,
        file: file.unwrap_or_default(),
        line: line_number,
        original_code,
        fixed_code: fixed_code.or_else(|| Some(description.to_string())),
        confidence: ProposedFix::confidence_for(strategy, issue.severity),
    }
}

fn apply_template(strategy: FixStrategy, original: &str) -> String {
    static VAR_ASSIGN: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"(\w+)\s*=").unwrap());

    match strategy {
        FixStrategy::Replace => {
            if let Some(caps) = VAR_ASSIGN.captures(original) {
                format!(
                    "let {} = std::env::var(\"{}\").unwrap_or_default();",
                    &caps[1],
                    caps[1].to_uppercase()
                )
            } else {
                original.to_string()
            }
        }
        _ => original.to_string(),
    }
}

/// Writes the fixes a reviewer could not (or should not) auto-apply to
/// `QA_FIX_REQUEST.md` so a person can act on them before the next pass.
async fn write_fix_request(worktree: &Path, fixes: &[ProposedFix]) -> Result<(), QaError> {
    let mut body = String::from("# QA Fix Request\n\nThe following issues need attention:\n\n");
    for (i, fix) in fixes.iter().enumerate() {
        body.push_str(&format!("## Issue {}: {}\n", i + 1, fix.issue_title));
        body.push_str(&format!("- **File**: {}\n", fix.file));
        body.push_str(&format!("- **Strategy**: {:?}\n", fix.strategy));
        body.push_str(&format!("- **Confidence**: {:.2}\n", fix.confidence));
        if let Some(original) = &fix.original_code {
            body.push_str(&format!("- **Original**: `{original}`\n"));
        }
        if let Some(fixed) = &fix.fixed_code {
            body.push_str(&format!("- **Suggested**: `{fixed}`\n"));
        }
        body.push('\n');
    }
    body.push_str("---\nAfter addressing these, the QA loop will re-run automatically.\n");

    tokio::fs::write(worktree.join("QA_FIX_REQUEST.md"), body).await?;
    Ok(())
}

async fn apply_fix(worktree: &Path, fix: &ProposedFix) -> bool {
    if fix.file.is_empty() || fix.strategy == FixStrategy::Manual {
        return false;
    }
    let path = worktree.join(&fix.file);
    let Ok(content) = tokio::fs::read_to_string(&path).await else {
        return false;
    };
    if !fix.strategy.validate(fix.fixed_code.as_deref()) {
        return false;
    }

    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    match (fix.strategy, fix.line) {
        (FixStrategy::Delete, Some(line)) if line >= 1 && line <= lines.len() => {
            lines.remove(line - 1);
        }
        (FixStrategy::Delete, None) => {
            // No location to delete from; nothing to do.
        }
        (_, Some(line)) if line >= 1 && line <= lines.len() => {
            let Some(fixed) = &fix.fixed_code else {
                return false;
            };
            lines[line - 1] = fixed.clone();
        }
        _ => {
            // No localized line: fall back to appending so the fix isn't lost.
            if let Some(fixed) = &fix.fixed_code {
                lines.push(fixed.clone());
            }
        }
    }

    let mut new_content = lines.join("\n");
    if !new_content.ends_with('\n') {
        new_content.push('\n');
    }
    tokio::fs::write(&path, new_content).await.is_ok()
}

pub struct AutoFixer {
    auto_apply: bool,
    min_confidence: f64,
}

impl AutoFixer {
    pub fn new(auto_apply: bool, min_confidence: f64) -> Self {
        Self {
            auto_apply,
            min_confidence,
        }
    }
}

impl Default for AutoFixer {
    fn default() -> Self {
        Self::new(false, 0.7)
    }
}

#[async_trait]
impl FixerTrait for AutoFixer {
    async fn fix(&self, worktree: &Path, issues: &[QaIssue]) -> Result<Vec<String>, QaError> {
        let mut applied = Vec::new();
        let mut pending = Vec::new();

        for issue in issues {
            let fix = propose_fix(worktree, issue).await;
            if fix.should_auto_apply(self.auto_apply, self.min_confidence) {
                if apply_fix(worktree, &fix).await {
                    info!("auto-applied fix for '{}' in {}", fix.issue_title, fix.file);
                    applied.push(fix.issue_title.clone());
                } else {
                    warn!("failed to apply fix for '{}'", fix.issue_title);
                    pending.push(fix);
                }
            } else {
                pending.push(fix);
            }
        }

        if !pending.is_empty() {
            write_fix_request(worktree, &pending).await?;
        }

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qa::models::CheckCategory;
    use tempfile::tempdir;

    fn issue(title: &str, severity: Severity, location: Option<&str>) -> QaIssue {
        QaIssue {
            title: title.to_string(),
            severity,
            description: "desc".to_string(),
            location: location.map(str::to_string),
            fix_required: true,
            category: CheckCategory::Style,
        }
    }

    #[tokio::test]
    async fn unknown_issue_proposes_manual_strategy() {
        let dir = tempdir().unwrap();
        let fix = propose_fix(dir.path(), &issue("some unheard of issue", Severity::Low, None)).await;
        assert_eq!(fix.strategy, FixStrategy::Manual);
    }

    #[tokio::test]
    async fn debug_print_issue_proposes_delete() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("lib.rs"), "fn f() {\n    println!(\"DEBUG\");\n}\n").unwrap();
        let fix = propose_fix(dir.path(), &issue("no debug prints", Severity::Low, Some("lib.rs:2"))).await;
        assert_eq!(fix.strategy, FixStrategy::Delete);
        assert_eq!(fix.original_code.as_deref(), Some("    println!(\"DEBUG\");"));
    }

    #[tokio::test]
    async fn delete_strategy_removes_the_offending_line() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("lib.rs"),
            "fn f() {\n    println!(\"DEBUG\");\n    42\n}\n",
        )
        .unwrap();
        let fix = propose_fix(dir.path(), &issue("no debug prints", Severity::Low, Some("lib.rs:2"))).await;
        assert!(apply_fix(dir.path(), &fix).await);

        let result = std::fs::read_to_string(dir.path().join("lib.rs")).unwrap();
        assert_eq!(result, "fn f() {\n    42\n}\n");
    }

    #[tokio::test]
    async fn replace_strategy_splices_in_place_rather_than_appending() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("lib.rs"),
            "fn f() {\n    let api_key = \"sk-live-secret\";\n}\n",
        )
        .unwrap();
        let fix = propose_fix(
            dir.path(),
            &issue("hardcoded secrets", Severity::Critical, Some("lib.rs:2")),
        )
        .await;
        assert!(apply_fix(dir.path(), &fix).await);

        let result = std::fs::read_to_string(dir.path().join("lib.rs")).unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_ne!(lines[1], "    let api_key = \"sk-live-secret\";");
    }

    #[tokio::test]
    async fn manual_fixes_never_auto_apply() {
        let dir = tempdir().unwrap();
        let fixer = AutoFixer::new(true, 0.0);
        let result = fixer
            .fix(dir.path(), &[issue("some unheard of issue", Severity::Low, None)])
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(dir.path().join("QA_FIX_REQUEST.md").exists());
    }
}
