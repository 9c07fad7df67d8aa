//! git2-backed implementation of [`GitService`].
//!
//! Repository access is blocking, so every query runs on tokio's blocking
//! pool and the caller only ever awaits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::{BlameOptions, DiffFormat, DiffOptions, Oid, Repository, Sort, Tree};
use margin_core::{Commit, GitUri, MarginError, UNCOMMITTED_SHA};
use margin_difflens::diff::FileDiff;
use margin_difflens::parser::parse_unified_diff;

use crate::blame::{BlameLine, GitBlame};
use crate::service::{GitService, LogOptions};

/// Queries a repository on disk through libgit2.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use margin_git::repository::LocalGitService;
/// use margin_git::service::{GitService, LogOptions};
///
/// # async fn run() -> Result<(), margin_core::MarginError> {
/// let git = LocalGitService::new();
/// let commit = git
///     .get_log_commit(Path::new("."), Path::new("src/main.rs"), LogOptions { previous: true })
///     .await?;
/// if let Some(commit) = commit {
///     println!("{} by {}", commit.short_sha(), commit.author);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct LocalGitService;

impl LocalGitService {
    pub fn new() -> Self {
        Self
    }
}

/// Walk upwards from `start` to the enclosing repository's working directory.
///
/// # Errors
///
/// Returns [`MarginError::Git`] if `start` is not inside a non-bare repository.
pub fn discover_repo_root(start: &Path) -> Result<PathBuf, MarginError> {
    let repo = Repository::discover(start)
        .map_err(|e| MarginError::Git(format!("failed to discover repository: {e}")))?;
    repo.workdir()
        .map(Path::to_path_buf)
        .ok_or_else(|| MarginError::Git("repository has no working directory".into()))
}

impl GitService for LocalGitService {
    async fn get_log_commit(
        &self,
        repo_path: &Path,
        path: &Path,
        options: LogOptions,
    ) -> Result<Option<Commit>, MarginError> {
        let repo_path = repo_path.to_path_buf();
        let path = path.to_path_buf();
        run_blocking(move || log_commit(&repo_path, &path, options)).await
    }

    async fn get_diff_for_file(
        &self,
        uri: &GitUri,
        since_sha: Option<&str>,
    ) -> Result<Option<FileDiff>, MarginError> {
        let uri = uri.clone();
        let since_sha = since_sha.map(str::to_string);
        run_blocking(move || diff_for_file(&uri, since_sha.as_deref())).await
    }

    async fn has_remote(&self, repo_path: &Path) -> Result<bool, MarginError> {
        let repo_path = repo_path.to_path_buf();
        run_blocking(move || {
            let repo = open(&repo_path)?;
            let remotes = repo
                .remotes()
                .map_err(|e| MarginError::Git(format!("failed to list remotes: {e}")))?;
            Ok(!remotes.is_empty())
        })
        .await
    }

    async fn get_blame_for_file(&self, uri: &GitUri) -> Result<Option<GitBlame>, MarginError> {
        let uri = uri.clone();
        run_blocking(move || blame_for_file(&uri)).await
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, MarginError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, MarginError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MarginError::Git(format!("git task failed: {e}")))?
}

fn open(repo_path: &Path) -> Result<Repository, MarginError> {
    Repository::open(repo_path)
        .map_err(|e| MarginError::Git(format!("failed to open repository: {e}")))
}

fn log_commit(
    repo_path: &Path,
    path: &Path,
    options: LogOptions,
) -> Result<Option<Commit>, MarginError> {
    let repo = open(repo_path)?;

    let mut revwalk = repo
        .revwalk()
        .map_err(|e| MarginError::Git(format!("failed to create revwalk: {e}")))?;
    revwalk.set_sorting(Sort::TIME).ok();

    // An unborn HEAD means there is no history at all
    if revwalk.push_head().is_err() {
        return Ok(None);
    }

    let wanted = if options.previous { 2 } else { 1 };
    let mut touching: Vec<git2::Commit<'_>> = Vec::with_capacity(wanted);

    for oid_result in revwalk {
        let oid = oid_result.map_err(|e| MarginError::Git(format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| MarginError::Git(format!("failed to find commit: {e}")))?;

        if touches_path(&commit, path)? {
            touching.push(commit);
            if touching.len() == wanted {
                break;
            }
        }
    }

    let Some(latest) = touching.first() else {
        return Ok(None);
    };

    let previous_sha = if options.previous {
        match touching.get(1) {
            Some(previous) => Some(previous.id().to_string()),
            // The file was created here; its previous revision is the parent
            None => latest.parent_id(0).ok().map(|oid| oid.to_string()),
        }
    } else {
        None
    };

    Ok(Some(to_commit(repo_path, path, latest, previous_sha)))
}

fn touches_path(commit: &git2::Commit<'_>, path: &Path) -> Result<bool, MarginError> {
    let tree = commit
        .tree()
        .map_err(|e| MarginError::Git(format!("failed to get commit tree: {e}")))?;
    let current = entry_id(&tree, path);

    if commit.parent_count() == 0 {
        return Ok(current.is_some());
    }

    let parent = commit
        .parent(0)
        .map_err(|e| MarginError::Git(format!("failed to get parent: {e}")))?;
    let parent_tree = parent
        .tree()
        .map_err(|e| MarginError::Git(format!("failed to get parent tree: {e}")))?;

    Ok(current != entry_id(&parent_tree, path))
}

fn entry_id(tree: &Tree<'_>, path: &Path) -> Option<Oid> {
    tree.get_path(path).ok().map(|entry| entry.id())
}

fn to_commit(
    repo_path: &Path,
    path: &Path,
    commit: &git2::Commit<'_>,
    previous_sha: Option<String>,
) -> Commit {
    let author = commit.author();
    Commit {
        sha: commit.id().to_string(),
        previous_sha,
        repo_path: repo_path.to_path_buf(),
        file_name: path.to_path_buf(),
        author: author.name().unwrap_or("unknown").to_string(),
        email: author.email().unwrap_or("unknown").to_string(),
        date: to_datetime(author.when().seconds()),
        message: commit.summary().unwrap_or("").to_string(),
    }
}

fn to_datetime(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

fn diff_for_file(uri: &GitUri, since_sha: Option<&str>) -> Result<Option<FileDiff>, MarginError> {
    let repo = open(&uri.repo_path)?;

    let tree = match since_sha {
        Some(sha) => {
            let oid = Oid::from_str(sha)
                .map_err(|e| MarginError::Git(format!("invalid sha '{sha}': {e}")))?;
            let Ok(commit) = repo.find_commit(oid) else {
                return Ok(None);
            };
            Some(
                commit
                    .tree()
                    .map_err(|e| MarginError::Git(format!("failed to get commit tree: {e}")))?,
            )
        }
        None => None,
    };

    let relative = uri.relative_path();
    let mut opts = DiffOptions::new();
    opts.pathspec(relative)
        .disable_pathspec_match(true)
        .include_untracked(true)
        .recurse_untracked_dirs(true)
        .show_untracked_content(true);

    let diff = repo
        .diff_tree_to_workdir_with_index(tree.as_ref(), Some(&mut opts))
        .map_err(|e| MarginError::Git(format!("failed to compute diff: {e}")))?;

    let mut patch = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        match line.origin() {
            '+' | '-' | ' ' => patch.push(line.origin()),
            // End-of-file newline markers carry no line content
            '=' | '>' | '<' => return true,
            _ => {}
        }
        patch.push_str(&String::from_utf8_lossy(line.content()));
        true
    })
    .map_err(|e| MarginError::Git(format!("failed to render diff: {e}")))?;

    let files = parse_unified_diff(&patch)?;
    Ok(files
        .into_iter()
        .find(|file| file.new_path == relative || file.old_path == relative))
}

fn blame_for_file(uri: &GitUri) -> Result<Option<GitBlame>, MarginError> {
    let repo = open(&uri.repo_path)?;
    let relative = uri.relative_path();

    let mut opts = BlameOptions::new();
    let Ok(committed) = repo.blame_file(relative, Some(&mut opts)) else {
        // Untracked or no history
        return Ok(None);
    };

    let contents = std::fs::read(uri.fs_path())?;
    let blame = committed
        .blame_buffer(&contents)
        .map_err(|e| MarginError::Git(format!("failed to blame working copy: {e}")))?;

    let mut lines = Vec::new();
    let mut commits: HashMap<String, Commit> = HashMap::new();

    for hunk in blame.iter() {
        let oid = hunk.final_commit_id();
        let sha = if oid.is_zero() {
            UNCOMMITTED_SHA.to_string()
        } else {
            oid.to_string()
        };

        if !commits.contains_key(&sha) {
            let commit = if oid.is_zero() {
                uncommitted(uri)
            } else {
                let found = repo
                    .find_commit(oid)
                    .map_err(|e| MarginError::Git(format!("failed to find commit: {e}")))?;
                let previous = found.parent_id(0).ok().map(|p| p.to_string());
                to_commit(&uri.repo_path, relative, &found, previous)
            };
            commits.insert(sha.clone(), commit);
        }

        // final_start_line is 1-based
        let start = hunk.final_start_line().saturating_sub(1);
        for offset in 0..hunk.lines_in_hunk() {
            lines.push(BlameLine {
                line: (start + offset) as u32,
                sha: sha.clone(),
            });
        }
    }

    lines.sort_by_key(|l| l.line);
    tracing::trace!(uri = %uri, lines = lines.len(), commits = commits.len(), "blamed file");

    Ok(Some(GitBlame::new(
        uri.clone(),
        lines,
        commits.into_values().collect(),
    )))
}

fn uncommitted(uri: &GitUri) -> Commit {
    Commit {
        sha: UNCOMMITTED_SHA.to_string(),
        previous_sha: None,
        repo_path: uri.repo_path.clone(),
        file_name: uri.path.clone(),
        author: "You".into(),
        email: String::new(),
        date: Utc::now(),
        message: "Uncommitted changes".into(),
    }
}
