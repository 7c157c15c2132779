//! Project discovery: the fixed first phase of every pipeline run. Scans the
//! repository for tech stack and service structure so later phases (context,
//! impact) don't each re-walk the tree.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::spec::error::PipelineError;
use crate::spec::pipeline::{Phase, PipelineContext};

const IGNORE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".venv",
    "venv",
    "dist",
    "build",
    "out",
    ".next",
    ".nuxt",
    "coverage",
    ".worktrees",
    ".state",
    "target",
    "vendor",
];

static LANGUAGE_PATTERNS: Lazy<Vec<(&'static str, &'static [&'static str])>> = Lazy::new(|| {
    vec![
        ("typescript", &["ts", "tsx"]),
        ("javascript", &["js", "jsx", "mjs", "cjs"]),
        ("python", &["py"]),
        ("rust", &["rs"]),
        ("go", &["go"]),
        ("java", &["java"]),
        ("csharp", &["cs"]),
        ("ruby", &["rb"]),
        ("php", &["php"]),
    ]
});

const FRAMEWORK_MARKER_FILES: &[(&str, &str)] = &[
    ("next.config.js", "next"),
    ("next.config.ts", "next"),
    ("next.config.mjs", "next"),
    ("angular.json", "angular"),
    ("manage.py", "django"),
    ("Cargo.toml", "rust-crate"),
    ("go.mod", "go-module"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub path: String,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectIndex {
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub services: Vec<ServiceInfo>,
    pub entry_points: Vec<String>,
    pub test_dirs: Vec<String>,
    pub file_count: usize,
}

fn should_ignore(path: &Path) -> bool {
    path.components()
        .any(|c| IGNORE_DIRS.contains(&c.as_os_str().to_string_lossy().as_ref()))
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Walks the project root once, classifying languages by extension,
/// frameworks by marker file, and collecting candidate service directories
/// (immediate subdirectories of `services/`, `apps/`, or `packages/`, each
/// treated as an independently-languaged unit in a monorepo).
pub fn build_index(root: &Path) -> ProjectIndex {
    let mut languages: HashSet<String> = HashSet::new();
    let mut frameworks: HashSet<String> = HashSet::new();
    let mut test_dirs: HashSet<String> = HashSet::new();
    let mut entry_points = Vec::new();
    let mut file_count = 0usize;
    let mut service_files: HashMap<String, HashSet<String>> = HashMap::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !should_ignore(e.path()))
    {
        if !entry.file_type().is_file() {
            continue;
        }
        file_count += 1;
        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        let relative_str = relative.to_string_lossy().replace('\\', "/");

        if let Some(ext) = extension_of(entry.path()) {
            for (lang, exts) in LANGUAGE_PATTERNS.iter() {
                if exts.contains(&ext.as_str()) {
                    languages.insert(lang.to_string());
                }
            }
        }

        if let Some(name) = entry.path().file_name().and_then(|n| n.to_str()) {
            for (marker, framework) in FRAMEWORK_MARKER_FILES {
                if name == *marker {
                    frameworks.insert(framework.to_string());
                }
            }
            if name == "main.rs" || name == "main.py" || name == "index.ts" || name == "index.js" {
                entry_points.push(relative_str.clone());
            }
        }

        if relative_str.contains("/test") || relative_str.contains("/tests/") || relative_str.starts_with("tests/") {
            if let Some(parent) = relative.parent() {
                test_dirs.insert(parent.to_string_lossy().to_string());
            }
        }

        for root_dir in ["services", "apps", "packages"] {
            if let Some(rest) = relative_str.strip_prefix(&format!("{root_dir}/")) {
                if let Some((service, _)) = rest.split_once('/') {
                    let key = format!("{root_dir}/{service}");
                    if let Some(ext) = extension_of(entry.path()) {
                        for (lang, exts) in LANGUAGE_PATTERNS.iter() {
                            if exts.contains(&ext.as_str()) {
                                service_files.entry(key.clone()).or_default().insert(lang.to_string());
                            }
                        }
                    } else {
                        service_files.entry(key).or_default();
                    }
                }
            }
        }
    }

    let mut services: Vec<ServiceInfo> = service_files
        .into_iter()
        .map(|(path, langs)| ServiceInfo {
            name: path.rsplit('/').next().unwrap_or(&path).to_string(),
            path,
            languages: {
                let mut v: Vec<String> = langs.into_iter().collect();
                v.sort();
                v
            },
        })
        .collect();
    services.sort_by(|a, b| a.path.cmp(&b.path));

    let mut languages: Vec<String> = languages.into_iter().collect();
    languages.sort();
    let mut frameworks: Vec<String> = frameworks.into_iter().collect();
    frameworks.sort();
    let mut test_dirs: Vec<String> = test_dirs.into_iter().collect();
    test_dirs.sort();

    ProjectIndex {
        languages,
        frameworks,
        services,
        entry_points,
        test_dirs,
        file_count,
    }
}

pub struct DiscoveryPhase {
    pub project_root: std::path::PathBuf,
}

#[async_trait]
impl Phase for DiscoveryPhase {
    fn name(&self) -> &str {
        "discovery"
    }

    async fn run(&self, _ctx: &PipelineContext) -> Result<serde_json::Value, PipelineError> {
        let index = build_index(&self.project_root);
        serde_json::to_value(&index).map_err(|source| PipelineError::Serde {
            entity: "project_index".to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_rust_crate_and_entry_point() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();

        let index = build_index(dir.path());
        assert!(index.languages.contains(&"rust".to_string()));
        assert!(index.frameworks.contains(&"rust-crate".to_string()));
        assert!(index.entry_points.iter().any(|p| p.ends_with("main.rs")));
    }

    #[test]
    fn groups_monorepo_services_by_top_level_dir() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("services/api")).unwrap();
        std::fs::write(dir.path().join("services/api/main.py"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("services/worker")).unwrap();
        std::fs::write(dir.path().join("services/worker/main.go"), "").unwrap();

        let index = build_index(dir.path());
        assert_eq!(index.services.len(), 2);
    }

    #[test]
    fn ignores_vendored_directories() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/x.js"), "").unwrap();

        let index = build_index(dir.path());
        assert_eq!(index.file_count, 0);
    }
}
