//! Worktree lifecycle: create an isolated git worktree per spec, track its
//! state on disk, and merge or clean it up once the QA loop signs off.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::subprocess::{GitRunner, SubprocessManager};
use crate::worktree::error::WorktreeError;
use crate::worktree::state::{WorktreeState, WorktreeStatus};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_REMOTE: &str = "origin";

fn is_retryable(err: &crate::subprocess::ProcessError) -> bool {
    let msg = err.to_string().to_lowercase();
    ["connection", "network", "timeout", "reset", "refused"]
        .iter()
        .any(|needle| msg.contains(needle))
        || msg.contains(" 500")
        || msg.contains(" 502")
        || msg.contains(" 503")
}

/// Isolates concurrent spec work in dedicated git worktrees, one branch per spec.
pub struct WorktreeManager {
    repo_root: PathBuf,
    worktrees_root: PathBuf,
    state_dir: PathBuf,
    namespace: String,
    subprocess: SubprocessManager,
    cancellation: CancellationToken,
}

impl WorktreeManager {
    pub fn new(repo_root: PathBuf, subprocess: SubprocessManager) -> Result<Self, WorktreeError> {
        Ok(Self {
            worktrees_root: repo_root.join(".worktrees"),
            state_dir: repo_root.join(".state").join("worktrees"),
            namespace: "session".to_string(),
            repo_root,
            subprocess,
            cancellation: CancellationToken::new(),
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Overrides the `.state`-style directory name state is kept under,
    /// relative to the repo root.
    pub fn with_state_root(mut self, state_root: &str) -> Self {
        self.state_dir = self.repo_root.join(state_root).join("worktrees");
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Clone of the token every retryable operation watches; call `.cancel()`
    /// on it to interrupt in-flight backoff sleeps and subprocess calls.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Ensures the worktree root directory exists. Idempotent.
    pub async fn setup(&self) -> Result<(), WorktreeError> {
        fs::create_dir_all(&self.worktrees_root).await?;
        fs::create_dir_all(&self.state_dir).await?;
        Ok(())
    }

    fn state_path(&self, name: &str) -> PathBuf {
        self.state_dir.join(format!("{name}.json"))
    }

    /// Atomically persist `state` by writing to a `.tmp` sibling then renaming
    /// it over the final path — the canonical crash-safe write pattern used
    /// for every JSON artifact this engine owns.
    async fn write_state(&self, state: &WorktreeState) -> Result<(), WorktreeError> {
        fs::create_dir_all(&self.state_dir).await?;
        let final_path = self.state_path(&state.name);
        let tmp_path = final_path.with_extension("json.tmp");

        let json =
            serde_json::to_string_pretty(state).map_err(|source| WorktreeError::State {
                name: state.name.clone(),
                source,
            })?;

        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &final_path).await?;

        Ok(())
    }

    async fn read_state(&self, name: &str) -> Result<WorktreeState, WorktreeError> {
        let raw = fs::read_to_string(self.state_path(name)).await?;
        serde_json::from_str(&raw).map_err(|source| WorktreeError::State {
            name: name.to_string(),
            source,
        })
    }

    async fn update_session_state<F>(&self, name: &str, f: F) -> Result<WorktreeState, WorktreeError>
    where
        F: FnOnce(&mut WorktreeState),
    {
        let mut state = self.read_state(name).await?;
        f(&mut state);
        state.updated_at = chrono::Utc::now();
        self.write_state(&state).await?;
        Ok(state)
    }

    /// Detects the base branch to fork from: configured override, else
    /// `main`, else `master`, else the repo's current branch (with a
    /// warning, since that's rarely what the caller intended).
    async fn detect_base_branch(&self, configured: Option<&str>) -> Result<String, WorktreeError> {
        if let Some(b) = configured {
            return Ok(b.to_string());
        }

        let git = self.subprocess.git();
        for candidate in ["main", "master"] {
            if git
                .branch_exists(&self.repo_root, candidate)
                .await
                .unwrap_or(false)
            {
                return Ok(candidate.to_string());
            }
        }

        let current = git.current_branch(&self.repo_root).await?;
        if current.is_empty() {
            return Err(WorktreeError::NoBaseBranch);
        }
        warn!(
            "no main/master branch found, falling back to current branch '{}'",
            current
        );
        Ok(current)
    }

    /// Runs a git operation with exponential backoff (2^(attempt-1) seconds,
    /// capped at [`MAX_RETRY_ATTEMPTS`]) when the failure looks transient
    /// (network/connection/timeout). This is distinct from — and must never
    /// share a retry budget with — the spec pipeline's fixed-delay phase retry.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, WorktreeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, crate::subprocess::ProcessError>>,
    {
        let mut attempt = 1;
        loop {
            if self.cancellation.is_cancelled() {
                return Err(WorktreeError::Cancelled("retry".to_string()));
            }

            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if is_retryable(&e) && attempt < MAX_RETRY_ATTEMPTS => {
                    let delay = Duration::from_secs(2u64.pow(attempt - 1));
                    warn!(
                        "retryable git error on attempt {attempt}/{MAX_RETRY_ATTEMPTS}, backing off {delay:?}: {e}"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancellation.cancelled() => {
                            return Err(WorktreeError::Cancelled("retry".to_string()));
                        }
                    }
                    attempt += 1;
                }
                Err(e) if is_retryable(&e) => {
                    return Err(WorktreeError::RetriesExhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Creates a new isolated worktree and branch for `spec_slug`. Fails with
    /// [`WorktreeError::NamespaceConflict`] if one is already tracked.
    ///
    /// Per the creation algorithm: any stale directory or branch left over
    /// from a previous, untracked attempt is force-removed first, then the
    /// base branch is fetched from the remote (best-effort — fetch failure
    /// just means we fall back to the local base branch).
    pub async fn create_worktree(
        &self,
        spec_slug: &str,
        base_branch: Option<&str>,
    ) -> Result<WorktreeState, WorktreeError> {
        let name = spec_slug.to_string();

        if self.state_path(&name).exists() {
            return Err(WorktreeError::NamespaceConflict(name));
        }

        self.setup().await?;

        let base = self.detect_base_branch(base_branch).await?;
        let branch = format!("{}/{}", self.namespace, spec_slug);
        let worktree_path = self.worktrees_root.join(&name);

        let git = self.subprocess.git();

        if worktree_path.exists() {
            warn!(
                "removing stale worktree directory for spec '{}' before create",
                spec_slug
            );
            let path_str = worktree_path.to_string_lossy().to_string();
            let _ = git
                .run_command(&["worktree", "remove", "--force", &path_str])
                .await;
            let _ = fs::remove_dir_all(&worktree_path).await;
        }
        if git.branch_exists(&self.repo_root, &branch).await? {
            warn!(
                "removing stale branch '{}' for spec '{}' before create",
                branch, spec_slug
            );
            let _ = git.run_command(&["branch", "-D", &branch]).await;
        }

        let fetch_ok = self
            .with_retry(|| git.fetch(&self.repo_root, DEFAULT_REMOTE, &base))
            .await
            .is_ok();
        let remote_ref = format!("{DEFAULT_REMOTE}/{base}");
        let create_from = if fetch_ok
            && git
                .run_command(&["rev-parse", "--verify", &format!("refs/remotes/{remote_ref}")])
                .await
                .map(|o| o.status.success())
                .unwrap_or(false)
        {
            remote_ref
        } else {
            base.clone()
        };

        let wt_path_str = worktree_path.to_string_lossy().to_string();
        let create_output = git
            .run_command(&["worktree", "add", "-b", &branch, &wt_path_str, &create_from])
            .await?;
        if !create_output.status.success() {
            return Err(WorktreeError::Process(crate::subprocess::ProcessError::ExitCode(
                create_output.status.code().unwrap_or(1),
            )));
        }

        let state = WorktreeState::new(name, spec_slug, branch, base, worktree_path);
        self.write_state(&state).await?;

        info!("created worktree for spec '{}'", spec_slug);
        Ok(state)
    }

    /// Idempotent variant of [`create_worktree`](Self::create_worktree): if a
    /// session is already tracked for `spec_slug`, returns its existing state
    /// instead of erroring.
    pub async fn get_or_create(
        &self,
        spec_slug: &str,
        base_branch: Option<&str>,
    ) -> Result<WorktreeState, WorktreeError> {
        if self.state_path(spec_slug).exists() {
            return self.read_state(spec_slug).await;
        }
        self.create_worktree(spec_slug, base_branch).await
    }

    /// Stages and commits all changes in a session's worktree. "Nothing to
    /// commit" is treated as success, not an error.
    pub async fn commit_in_worktree(
        &self,
        name: &str,
        message: &str,
    ) -> Result<Option<String>, WorktreeError> {
        let state = self.read_state(name).await?;
        let git = self.subprocess.git();

        git.add(&state.path, &["-A"]).await?;

        let path_str = state.path.to_string_lossy().to_string();
        let output = git
            .run_command(&["-C", &path_str, "commit", "-m", message])
            .await?;

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let hash = stdout
                .lines()
                .find(|l| l.contains("]"))
                .and_then(|l| l.split_whitespace().nth(1))
                .map(|s| s.trim_matches(['[', ']']).to_string())
                .unwrap_or_default();
            Ok(Some(hash))
        } else {
            let combined = format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )
            .to_lowercase();
            if combined.contains("nothing to commit") {
                Ok(None)
            } else {
                Err(WorktreeError::Process(crate::subprocess::ProcessError::ExitCode(
                    output.status.code().unwrap_or(1),
                )))
            }
        }
    }

    /// Pushes a session's branch upstream with the manager's exponential
    /// backoff retry for transient network errors.
    pub async fn push_branch(&self, name: &str, force: bool) -> Result<(), WorktreeError> {
        let state = self.read_state(name).await?;
        let git = self.subprocess.git();

        if force {
            let path_str = state.path.to_string_lossy().to_string();
            let branch = state.branch.clone();
            let output = self
                .with_retry(|| {
                    git.run_command(&[
                        "-C",
                        &path_str,
                        "push",
                        "-u",
                        "--force",
                        DEFAULT_REMOTE,
                        &branch,
                    ])
                })
                .await?;
            if !output.status.success() {
                return Err(WorktreeError::Process(
                    crate::subprocess::ProcessError::ExitCode(output.status.code().unwrap_or(1)),
                ));
            }
        } else {
            let path = state.path.clone();
            let branch = state.branch.clone();
            self.with_retry(|| git.push(&path, DEFAULT_REMOTE, &branch))
                .await?;
        }

        Ok(())
    }

    /// Reports whether a worktree (or, if `name` is `None`, the main repo
    /// checkout) has uncommitted changes.
    pub async fn has_uncommitted_changes(&self, name: Option<&str>) -> Result<bool, WorktreeError> {
        let path = match name {
            Some(n) => self.read_state(n).await?.path,
            None => self.repo_root.clone(),
        };
        let status = self.subprocess.git().status(&path).await?;
        Ok(!status.clean)
    }

    /// Removes worktree directories on disk that Git no longer considers
    /// registered worktrees — leftovers from a process that died mid-cleanup.
    pub async fn cleanup_stale(&self) -> Result<Vec<String>, WorktreeError> {
        if !self.worktrees_root.exists() {
            return Ok(Vec::new());
        }

        let git = self.subprocess.git();
        let live_paths: std::collections::HashSet<String> = git
            .list_worktrees(&self.repo_root)
            .await?
            .into_iter()
            .map(|w| w.path)
            .collect();

        let mut removed = Vec::new();
        let mut entries = fs::read_dir(&self.worktrees_root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let path_str = path.to_string_lossy().to_string();
            if live_paths.contains(&path_str) {
                continue;
            }
            debug!("removing stale worktree directory {:?}", path);
            fs::remove_dir_all(&path).await?;
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                removed.push(name.to_string());
            }
        }

        Ok(removed)
    }

    /// Lists tracked sessions, cross-checked against `git worktree list
    /// --porcelain` — entries whose on-disk git worktree vanished out from
    /// under us are skipped rather than surfaced as ghosts.
    pub async fn list_sessions(&self) -> Result<Vec<WorktreeState>, WorktreeError> {
        if !self.state_dir.exists() {
            return Ok(Vec::new());
        }

        let git = self.subprocess.git();
        let live_paths: Vec<String> = git
            .list_worktrees(&self.repo_root)
            .await?
            .into_iter()
            .map(|w| w.path)
            .collect();

        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.state_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.read_state(name).await {
                Ok(state) => {
                    let path_str = state.path.to_string_lossy().to_string();
                    if state.status == WorktreeStatus::Active
                        && !live_paths.iter().any(|p| p == &path_str)
                    {
                        debug!("skipping stale worktree record '{}'", name);
                        continue;
                    }
                    sessions.push(state);
                }
                Err(e) => warn!("skipping unreadable worktree state '{}': {}", name, e),
            }
        }

        Ok(sessions)
    }

    /// Refreshes commit/diff statistics for a tracked session against its
    /// base branch, persisting the updated counters.
    pub async fn update_stats(&self, name: &str) -> Result<WorktreeState, WorktreeError> {
        let state = self.read_state(name).await?;
        let git = self.subprocess.git();
        let range = format!("{}..{}", state.base_branch, state.branch);

        let commits_ahead = git
            .rev_list_count(&self.repo_root, &range)
            .await
            .unwrap_or(0) as u32;
        let shortstat = git.diff_shortstat(&self.repo_root, &range).await.ok();

        let (files_changed, insertions, deletions) = shortstat
            .as_deref()
            .map(parse_shortstat)
            .unwrap_or((0, 0, 0));

        self.update_session_state(name, |s| {
            s.stats.commits_ahead = commits_ahead;
            s.stats.files_changed = files_changed;
            s.stats.insertions = insertions;
            s.stats.deletions = deletions;
        })
        .await
    }

    /// Merges a session's branch into its base with `--no-ff`, aborting
    /// cleanly on conflict rather than leaving the base repo mid-merge.
    pub async fn merge_session(&self, name: &str) -> Result<(), WorktreeError> {
        let state = self.read_state(name).await?;

        let git = self.subprocess.git();
        let range = format!("{}..{}", state.base_branch, state.branch);
        let ahead = git.rev_list_count(&self.repo_root, &range).await?;
        if ahead == 0 {
            return Err(WorktreeError::NothingToMerge(name.to_string()));
        }

        let message = format!("Merge {} into {}", state.branch, state.base_branch);
        let merge_result = git
            .run_command(&["merge", "--no-ff", "-m", &message, &state.branch])
            .await?;

        if !merge_result.status.success() {
            let _ = git.run_command(&["merge", "--abort"]).await;
            let detail = String::from_utf8_lossy(&merge_result.stderr).to_string();
            return Err(WorktreeError::MergeConflict {
                session: name.to_string(),
                target: state.base_branch.clone(),
                detail,
            });
        }

        self.update_session_state(name, |s| {
            s.merged = true;
            s.merged_at = Some(chrono::Utc::now());
            s.status = WorktreeStatus::Merged;
        })
        .await?;

        info!("merged session '{}' into '{}'", name, state.base_branch);
        Ok(())
    }

    /// Removes a session's worktree, branch, and state file. `force` is
    /// passed through to `git worktree remove` for sessions with uncommitted
    /// changes the caller has already decided to discard.
    pub async fn cleanup_session(&self, name: &str, force: bool) -> Result<(), WorktreeError> {
        let state = self.read_state(name).await?;
        let git = self.subprocess.git();

        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        let path_str = state.path.to_string_lossy().to_string();
        args.push(&path_str);
        let _ = git.run_command(&args).await;

        if git.branch_exists(&self.repo_root, &state.branch).await? {
            let _ = git.run_command(&["branch", "-D", &state.branch]).await;
        }

        if state.path.exists() {
            let _ = fs::remove_dir_all(&state.path).await;
        }

        let _ = fs::remove_file(self.state_path(name)).await;

        info!("cleaned up session '{}'", name);
        Ok(())
    }

    /// Marks a session abandoned without deleting its worktree, so its work
    /// remains inspectable until an explicit cleanup.
    pub async fn mark_abandoned(&self, name: &str) -> Result<WorktreeState, WorktreeError> {
        self.update_session_state(name, |s| s.status = WorktreeStatus::Abandoned)
            .await
    }

    pub fn worktree_path(&self, name: &str) -> PathBuf {
        self.worktrees_root.join(name)
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

/// Parses `git diff --shortstat` output, e.g.
/// `"3 files changed, 10 insertions(+), 2 deletions(-)"`.
fn parse_shortstat(line: &str) -> (u32, u32, u32) {
    let mut files = 0;
    let mut insertions = 0;
    let mut deletions = 0;

    for part in line.split(',') {
        let part = part.trim();
        if let Some(n) = part.split_whitespace().next().and_then(|s| s.parse().ok()) {
            if part.contains("file") {
                files = n;
            } else if part.contains("insertion") {
                insertions = n;
            } else if part.contains("deletion") {
                deletions = n;
            }
        }
    }

    (files, insertions, deletions)
}
