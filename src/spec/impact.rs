//! Dependency-graph impact analysis ("what does changing these files break").
//!
//! Uses an arena (`Vec<DependencyNode>` + a path→index map) rather than a
//! graph of reference-counted nodes, so the dependency/dependent edges are
//! plain indices instead of cycles that would need `Weak` to break.

use std::collections::{HashMap, HashSet, VecDeque};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default)]
pub struct DependencyNode {
    pub path: String,
    pub exports: Vec<String>,
    pub imports: Vec<String>,
    pub dependents: Vec<usize>,
    pub dependencies: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    index_by_path: HashMap<String, usize>,
}

impl DependencyGraph {
    pub fn build(files: &[(String, Vec<String>)]) -> Self {
        let mut graph = DependencyGraph::default();

        for (path, _) in files {
            let idx = graph.nodes.len();
            graph.nodes.push(DependencyNode {
                path: path.clone(),
                ..Default::default()
            });
            graph.index_by_path.insert(path.clone(), idx);
        }

        for (path, imports) in files {
            let idx = graph.index_by_path[path];
            for raw_import in imports {
                if let Some(target) = resolve_import(path, raw_import, &graph.index_by_path) {
                    graph.nodes[idx].imports.push(raw_import.clone());
                    graph.nodes[idx].dependencies.push(target);
                    graph.nodes[target].dependents.push(idx);
                }
            }
        }

        graph
    }

    fn index_of(&self, path: &str) -> Option<usize> {
        self.index_by_path.get(path).copied()
    }

    /// BFS over `dependents` edges from the modify-set, returning every file
    /// transitively affected by the change (the modify-set itself included).
    pub fn find_affected_files(&self, modified: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();

        for path in modified {
            if let Some(idx) = self.index_of(path) {
                if seen.insert(idx) {
                    queue.push_back(idx);
                }
            }
        }

        while let Some(idx) = queue.pop_front() {
            for &dep in &self.nodes[idx].dependents {
                if seen.insert(dep) {
                    queue.push_back(dep);
                }
            }
        }

        let mut paths: Vec<String> = seen.into_iter().map(|i| self.nodes[i].path.clone()).collect();
        paths.sort();
        paths
    }
}

/// Resolves a raw import string against the file that imports it: relative
/// (`./foo`, `../bar`) or alias-prefixed (`@/`, `~/`) over common extensions.
fn resolve_import(
    from_path: &str,
    raw_import: &str,
    index: &HashMap<String, usize>,
) -> Option<usize> {
    let candidates: Vec<String> = if raw_import.starts_with("./") || raw_import.starts_with("../")
    {
        let base = std::path::Path::new(from_path)
            .parent()
            .unwrap_or_else(|| std::path::Path::new(""));
        let joined = base.join(raw_import);
        extension_candidates(&joined.to_string_lossy())
    } else if let Some(rest) = raw_import.strip_prefix("@/").or_else(|| raw_import.strip_prefix("~/")) {
        extension_candidates(rest)
    } else {
        return None;
    };

    candidates.iter().find_map(|c| index.get(c).copied())
}

fn extension_candidates(base: &str) -> Vec<String> {
    ["", ".ts", ".tsx", ".js", ".jsx", ".rs", "/index.ts", "/mod.rs"]
        .iter()
        .map(|ext| format!("{base}{ext}"))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactSeverity {
    None,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakingChange {
    pub kind: BreakingChangeKind,
    pub location: String,
    pub description: String,
    pub migration_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakingChangeKind {
    ApiChange,
    SchemaChange,
    ConfigChange,
}

static API_CHANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)pub fn \w+\([^)]*\)\s*->|export (function|const) \w+").unwrap());
static SCHEMA_CHANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)alter table|migration|#\[derive\(.*Serialize").unwrap());
static CONFIG_CHANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.env|config\.(toml|yaml|json)").unwrap());

pub fn detect_breaking_changes(diffs: &[(String, String)]) -> Vec<BreakingChange> {
    let mut seen = HashSet::new();
    let mut changes = Vec::new();

    for (path, diff) in diffs {
        let families: &[(&Regex, BreakingChangeKind, bool)] = &[
            (&API_CHANGE, BreakingChangeKind::ApiChange, false),
            (&SCHEMA_CHANGE, BreakingChangeKind::SchemaChange, true),
            (&CONFIG_CHANGE, BreakingChangeKind::ConfigChange, false),
        ];

        for (pattern, kind, migration_required) in families {
            if pattern.is_match(diff) {
                let description = format!("{kind:?} detected in {path}");
                let key = (*kind, path.clone(), description.clone());
                if seen.insert(key) {
                    changes.push(BreakingChange {
                        kind: *kind,
                        location: path.clone(),
                        description,
                        migration_required: *migration_required,
                    });
                }
            }
        }
    }

    changes
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactReport {
    pub affected_files: Vec<String>,
    pub affected_services: Vec<String>,
    pub breaking_changes: Vec<BreakingChange>,
    pub test_coverage_gaps: Vec<String>,
    pub rollback_complexity: RollbackComplexity,
    pub severity: ImpactSeverity,
    pub mitigations: Vec<String>,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackComplexity {
    Low,
    Medium,
    High,
}

fn assess_rollback_complexity(
    breaking_changes: &[BreakingChange],
    affected_files: &[String],
) -> RollbackComplexity {
    if breaking_changes.iter().any(|c| c.migration_required) || affected_files.len() > 20 {
        RollbackComplexity::High
    } else if affected_files.len() > 10 || breaking_changes.len() > 3 {
        RollbackComplexity::Medium
    } else {
        RollbackComplexity::Low
    }
}

fn identify_test_coverage_gaps(affected_files: &[String], test_stems: &HashSet<String>) -> Vec<String> {
    affected_files
        .iter()
        .filter(|f| {
            let stem = std::path::Path::new(f)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            !test_stems.contains(&stem)
        })
        .cloned()
        .collect()
}

fn calculate_severity(
    affected_files: usize,
    affected_services: usize,
    breaking_changes: &[BreakingChange],
    test_gaps: usize,
    rollback: RollbackComplexity,
) -> (ImpactSeverity, u32) {
    let files_score = match affected_files {
        n if n > 30 => 4,
        n if n > 15 => 3,
        n if n > 5 => 2,
        n if n > 0 => 1,
        _ => 0,
    };
    let services_score = match affected_services {
        n if n > 3 => 3,
        n if n > 1 => 2,
        1 => 1,
        _ => 0,
    };
    let breaking_score = if breaking_changes.iter().any(|c| c.migration_required) {
        4
    } else {
        match breaking_changes.len() {
            n if n > 5 => 3,
            n if n > 2 => 2,
            n if n > 0 => 1,
            _ => 0,
        }
    };
    let gap_score = match test_gaps {
        n if n > 2 => 2,
        n if n > 0 => 1,
        _ => 0,
    };
    let rollback_score = match rollback {
        RollbackComplexity::High => 2,
        RollbackComplexity::Medium => 1,
        RollbackComplexity::Low => 0,
    };

    let total = files_score + services_score + breaking_score + gap_score + rollback_score;
    let severity = match total {
        t if t >= 10 => ImpactSeverity::Critical,
        t if t >= 7 => ImpactSeverity::High,
        t if t >= 4 => ImpactSeverity::Medium,
        t if t >= 1 => ImpactSeverity::Low,
        _ => ImpactSeverity::None,
    };
    (severity, total)
}

pub fn analyze(
    graph: &DependencyGraph,
    modified_files: &[String],
    diffs: &[(String, String)],
    service_of: &dyn Fn(&str) -> Option<String>,
    test_stems: &HashSet<String>,
) -> ImpactReport {
    let affected_files = graph.find_affected_files(modified_files);
    let affected_services: Vec<String> = {
        let mut set = HashSet::new();
        for f in &affected_files {
            if let Some(svc) = service_of(f) {
                set.insert(svc);
            }
        }
        let mut v: Vec<_> = set.into_iter().collect();
        v.sort();
        v
    };
    let breaking_changes = detect_breaking_changes(diffs);
    let test_coverage_gaps = identify_test_coverage_gaps(&affected_files, test_stems);
    let rollback_complexity = assess_rollback_complexity(&breaking_changes, &affected_files);
    let (severity, score) = calculate_severity(
        affected_files.len(),
        affected_services.len(),
        &breaking_changes,
        test_coverage_gaps.len(),
        rollback_complexity,
    );

    let mitigations = build_mitigations(&breaking_changes, rollback_complexity);
    let reasoning = format!(
        "{} affected file(s) across {} service(s), {} breaking change(s), rollback={:?}, score={}",
        affected_files.len(),
        affected_services.len(),
        breaking_changes.len(),
        rollback_complexity,
        score
    );

    ImpactReport {
        affected_files,
        affected_services,
        breaking_changes,
        test_coverage_gaps,
        rollback_complexity,
        severity,
        mitigations,
        reasoning,
    }
}

fn build_mitigations(changes: &[BreakingChange], rollback: RollbackComplexity) -> Vec<String> {
    let mut mitigations = Vec::new();
    if changes.iter().any(|c| c.migration_required) {
        mitigations.push("Write and test a forward+backward migration before merge.".to_string());
    }
    if changes.iter().any(|c| c.kind == BreakingChangeKind::ApiChange) {
        mitigations.push("Version the API or provide a compatibility shim for existing callers.".to_string());
    }
    if rollback == RollbackComplexity::High {
        mitigations.push("Stage the rollout behind a feature flag so rollback doesn't require a revert.".to_string());
    }
    mitigations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bfs_finds_transitive_dependents() {
        let files = vec![
            ("a.rs".to_string(), vec![]),
            ("b.rs".to_string(), vec!["./a".to_string()]),
            ("c.rs".to_string(), vec!["./b".to_string()]),
        ];
        let graph = DependencyGraph::build(&files);
        let affected = graph.find_affected_files(&["a.rs".to_string()]);
        assert_eq!(affected, vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn severity_escalates_with_migration_required_change() {
        let changes = vec![BreakingChange {
            kind: BreakingChangeKind::SchemaChange,
            location: "db.rs".to_string(),
            description: "schema change".to_string(),
            migration_required: true,
        }];
        let (severity, _) = calculate_severity(1, 1, &changes, 0, RollbackComplexity::High);
        assert!(severity >= ImpactSeverity::Medium);
    }

    #[test]
    fn no_changes_means_no_severity() {
        let (severity, score) = calculate_severity(0, 0, &[], 0, RollbackComplexity::Low);
        assert_eq!(severity, ImpactSeverity::None);
        assert_eq!(score, 0);
    }
}
