//! Framework auto-detection and test execution for the Review phase.
//!
//! Detects which test runner a project uses from its manifest files, runs
//! its default test command with a hard wall-clock ceiling, and parses the
//! pass/fail summary out of stdout+stderr using a per-framework regex kept
//! in a small parser registry.

use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::qa::models::TestResults;
use crate::subprocess::{ProcessCommandBuilder, SubprocessManager};

const TEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestFramework {
    Pytest,
    Jest,
    Vitest,
    Mocha,
    GoTest,
}

impl TestFramework {
    fn command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            TestFramework::Pytest => ("pytest", &["-q"]),
            TestFramework::Jest => ("npx", &["jest", "--silent"]),
            TestFramework::Vitest => ("npx", &["vitest", "run"]),
            TestFramework::Mocha => ("npx", &["mocha"]),
            TestFramework::GoTest => ("go", &["test", "./..."]),
        }
    }
}

/// Detects the test framework from manifest files at the project root.
/// `go.mod` wins over a `package.json`, which wins over Python's pytest
/// markers — a project rarely carries more than one of these stacks.
pub fn detect_framework(project_root: &Path) -> Option<TestFramework> {
    if project_root.join("go.mod").exists() {
        return Some(TestFramework::GoTest);
    }

    if let Ok(raw) = std::fs::read_to_string(project_root.join("package.json")) {
        if let Ok(pkg) = serde_json::from_str::<serde_json::Value>(&raw) {
            let has_dep = |name: &str| {
                ["dependencies", "devDependencies"]
                    .iter()
                    .any(|section| pkg.get(section).and_then(|s| s.get(name)).is_some())
            };
            if has_dep("vitest") {
                return Some(TestFramework::Vitest);
            }
            if has_dep("jest") {
                return Some(TestFramework::Jest);
            }
            if has_dep("mocha") {
                return Some(TestFramework::Mocha);
            }
        }
    }

    if ["pytest.ini", "pyproject.toml", "setup.cfg"]
        .iter()
        .any(|f| project_root.join(f).exists())
    {
        return Some(TestFramework::Pytest);
    }

    None
}

static PYTEST_SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+) passed(?:, (\d+) failed)?").unwrap());
static JEST_SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tests:\s+(?:(\d+) failed, )?(\d+) passed, (\d+) total").unwrap());
static VITEST_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Tests\s+(?:(\d+) failed \| )?(\d+) passed(?:\s*\((\d+)\))?").unwrap()
});
static MOCHA_PASSING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) passing").unwrap());
static MOCHA_FAILING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) failing").unwrap());
static GO_PASS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^--- PASS:").unwrap());
static GO_FAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^--- FAIL:").unwrap());

/// Parses a framework's combined stdout+stderr into (passed, total). Each
/// framework gets its own regex so a format change in one never risks
/// silently mis-parsing another.
fn parse_summary(framework: TestFramework, output: &str) -> (u32, u32) {
    match framework {
        TestFramework::Pytest => PYTEST_SUMMARY
            .captures(output)
            .map(|c| {
                let passed: u32 = c[1].parse().unwrap_or(0);
                let failed: u32 = c.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
                (passed, passed + failed)
            })
            .unwrap_or((0, 0)),
        TestFramework::Jest => JEST_SUMMARY
            .captures(output)
            .map(|c| {
                let passed: u32 = c[2].parse().unwrap_or(0);
                let total: u32 = c[3].parse().unwrap_or(0);
                (passed, total)
            })
            .unwrap_or((0, 0)),
        TestFramework::Vitest => VITEST_SUMMARY
            .captures(output)
            .map(|c| {
                let failed: u32 = c.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
                let passed: u32 = c[2].parse().unwrap_or(0);
                (passed, passed + failed)
            })
            .unwrap_or((0, 0)),
        TestFramework::Mocha => {
            let passed: u32 = MOCHA_PASSING
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            let failed: u32 = MOCHA_FAILING
                .captures(output)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(0);
            (passed, passed + failed)
        }
        TestFramework::GoTest => {
            let passed = GO_PASS.find_iter(output).count() as u32;
            let failed = GO_FAIL.find_iter(output).count() as u32;
            (passed, passed + failed)
        }
    }
}

/// Runs the detected test framework's default command with a 300-second
/// ceiling, folding the parsed pass/total into `TestResults.unit_*` — this
/// harness runs one command per project, so integration/e2e counters stay
/// at `0/0` (vacuously "all passed") until a multi-command detector exists.
pub async fn run_tests(
    subprocess: &SubprocessManager,
    project_root: &Path,
) -> Result<TestResults, crate::subprocess::ProcessError> {
    let Some(framework) = detect_framework(project_root) else {
        debug!("no test framework detected at {:?}, skipping test execution", project_root);
        return Ok(TestResults::default());
    };

    let (program, args) = framework.command();
    let command = ProcessCommandBuilder::new(program)
        .args(args)
        .current_dir(project_root)
        .timeout(TEST_TIMEOUT)
        .build();

    let output = subprocess.runner().run(command).await?;
    let combined = format!("{}\n{}", output.stdout, output.stderr);
    let (passed, total) = parse_summary(framework, &combined);

    if total == 0 {
        warn!("{:?} produced no parseable test summary", framework);
    }

    Ok(TestResults {
        unit_passed: passed,
        unit_total: total,
        ..TestResults::default()
    })
}
