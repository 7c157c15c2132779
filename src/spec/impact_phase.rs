//! Wires [`impact::analyze`] into the pipeline: builds a dependency graph by
//! scanning the worktree for import statements, diffs against the base
//! branch to get the modified-file set, and reports the result as the
//! `impact` phase's artifact.
//!
//! Import extraction is a line-level regex heuristic (not a real parser per
//! language) — good enough to find same-repo relative/aliased imports, which
//! is all [`DependencyGraph::find_affected_files`] needs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use walkdir::WalkDir;

use crate::spec::error::PipelineError;
use crate::spec::impact::{self, DependencyGraph};
use crate::spec::pipeline::{Phase, PipelineContext};
use crate::subprocess::GitRunner;

const SCAN_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "rs", "py", "go"];
const IGNORE_DIRS: &[&str] = &["node_modules", ".git", "target", "dist", "build", ".venv", ".worktrees", ".state"];

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:import\s+.*?from\s+['"]([^'"]+)['"]|require\(['"]([^'"]+)['"]\)|^use\s+crate::([\w:]+)|^from\s+([\w.]+)\s+import)"#)
        .unwrap()
});

fn should_ignore(path: &Path) -> bool {
    path.components()
        .any(|c| IGNORE_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
}

fn extract_imports(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| IMPORT_LINE.captures(line))
        .filter_map(|caps| caps.iter().skip(1).find_map(|m| m).map(|m| m.as_str().to_string()))
        .collect()
}

fn scan_repo(root: &Path) -> Vec<(String, Vec<String>)> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && !should_ignore(e.path()))
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| SCAN_EXTENSIONS.contains(&ext))
        })
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).ok()?.to_string_lossy().replace('\\', "/");
            let content = std::fs::read_to_string(e.path()).ok()?;
            Some((relative, extract_imports(&content)))
        })
        .collect()
}

fn service_of(relative_path: &str) -> Option<String> {
    for root_dir in ["services", "apps", "packages"] {
        if let Some(rest) = relative_path.strip_prefix(&format!("{root_dir}/")) {
            if let Some((service, _)) = rest.split_once('/') {
                return Some(format!("{root_dir}/{service}"));
            }
        }
    }
    None
}

fn test_stems(files: &[(String, Vec<String>)]) -> HashSet<String> {
    files
        .iter()
        .map(|(path, _)| path)
        .filter(|path| path.contains("test") || path.contains("spec"))
        .filter_map(|path| {
            Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
        })
        .collect()
}

pub struct ImpactPhase {
    pub repo_root: PathBuf,
    pub base_branch: String,
    pub git: Arc<dyn GitRunner>,
}

#[async_trait]
impl Phase for ImpactPhase {
    fn name(&self) -> &str {
        "impact"
    }

    async fn run(&self, _ctx: &PipelineContext) -> Result<serde_json::Value, PipelineError> {
        let files = scan_repo(&self.repo_root);
        let graph = DependencyGraph::build(&files);
        let stems = test_stems(&files);

        let range = format!("{}...HEAD", self.base_branch);
        let modified_files = self.git.diff_name_only(&self.repo_root, &range).await?;

        let report = impact::analyze(&graph, &modified_files, &[], &service_of, &stems);
        serde_json::to_value(&report).map_err(|source| PipelineError::Serde {
            entity: "impact_report".to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_es_module_and_rust_imports() {
        let content = "import { x } from \"./util\";\nuse crate::foo::bar;\n";
        let imports = extract_imports(content);
        assert!(imports.contains(&"./util".to_string()));
        assert!(imports.contains(&"foo::bar".to_string()));
    }

    #[test]
    fn service_of_extracts_monorepo_segment() {
        assert_eq!(service_of("services/api/main.py"), Some("services/api".to_string()));
        assert_eq!(service_of("README.md"), None);
    }
}
