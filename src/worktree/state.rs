use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persistent record for one spec's isolated worktree.
///
/// Written to `.state/worktrees/{name}.json` using a write-to-`.tmp`-then-
/// `rename` pattern so a crash mid-write never leaves a half-written file
/// behind for the next run to trip over.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorktreeState {
    pub name: String,
    pub spec_slug: String,
    pub branch: String,
    pub base_branch: String,
    pub path: std::path::PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: WorktreeStatus,
    pub stats: WorktreeStats,
    pub merged: bool,
    pub merged_at: Option<DateTime<Utc>>,
    pub last_command: Option<String>,
    pub error: Option<String>,
}

impl WorktreeState {
    pub fn new(
        name: impl Into<String>,
        spec_slug: impl Into<String>,
        branch: impl Into<String>,
        base_branch: impl Into<String>,
        path: std::path::PathBuf,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            spec_slug: spec_slug.into(),
            branch: branch.into(),
            base_branch: base_branch.into(),
            path,
            created_at: now,
            updated_at: now,
            status: WorktreeStatus::Active,
            stats: WorktreeStats::default(),
            merged: false,
            merged_at: None,
            last_command: None,
            error: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeStatus {
    Active,
    Merged,
    Abandoned,
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct WorktreeStats {
    pub commits_ahead: u32,
    pub files_changed: u32,
    pub insertions: u32,
    pub deletions: u32,
    pub last_commit_sha: Option<String>,
}
