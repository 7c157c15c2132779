//! Skill Registry: given a task description and the files it touches,
//! returns the skill prompt blobs worth injecting. The shipped
//! implementation is deliberately dumb — keyword overlap between the task
//! description and a skill's front-matter `keywords` list — since ranking
//! relevance well is an agent's job, not this registry's.

use std::path::{Path, PathBuf};

use gray_matter::engine::YAML;
use gray_matter::Matter;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct SkillFrontMatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub keywords: Vec<String>,
    pub prompt: String,
}

pub trait SkillRegistry: Send + Sync {
    fn applicable_skills(&self, task_description: &str, changed_files: &[String]) -> Vec<Skill>;
}

/// Loads `*.md` files with YAML front-matter from a configured directory.
/// Returns an empty list if the directory doesn't exist — skills are
/// optional enrichment, not a hard dependency.
pub struct MarkdownSkillRegistry {
    skills_dir: PathBuf,
}

impl MarkdownSkillRegistry {
    pub fn new(skills_dir: PathBuf) -> Self {
        Self { skills_dir }
    }

    fn load_all(&self) -> Vec<Skill> {
        let Ok(entries) = std::fs::read_dir(&self.skills_dir) else {
            return Vec::new();
        };
        let matter = Matter::<YAML>::new();

        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("md"))
            .filter_map(|e| {
                let raw = std::fs::read_to_string(e.path()).ok()?;
                let parsed = matter.parse(&raw);
                let front: SkillFrontMatter = parsed.data.as_ref()?.deserialize().ok()?;
                Some(Skill {
                    name: front.name.unwrap_or_else(|| file_stem(&e.path())),
                    keywords: front.keywords,
                    prompt: parsed.content,
                })
            })
            .collect()
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

impl SkillRegistry for MarkdownSkillRegistry {
    fn applicable_skills(&self, task_description: &str, changed_files: &[String]) -> Vec<Skill> {
        let lower = task_description.to_lowercase();
        self.load_all()
            .into_iter()
            .filter(|skill| {
                skill.keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
                    || changed_files.iter().any(|f| skill.keywords.iter().any(|k| f.contains(k)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn matches_skill_by_keyword_in_task_description() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("graphql.md"),
            "---\nname: graphql\nkeywords: [graphql, resolver]\n---\nUse resolvers sparingly.\n",
        )
        .unwrap();

        let registry = MarkdownSkillRegistry::new(dir.path().to_path_buf());
        let skills = registry.applicable_skills("add a new graphql resolver", &[]);
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].name, "graphql");
    }

    #[test]
    fn missing_skills_dir_returns_empty() {
        let registry = MarkdownSkillRegistry::new(PathBuf::from("/nonexistent/skills"));
        assert!(registry.applicable_skills("anything", &[]).is_empty());
    }
}
