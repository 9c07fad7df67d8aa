//! The version-control queries the annotation and code lens layers depend on.

use std::path::Path;

use margin_core::{Commit, GitUri, MarginError};
use margin_difflens::diff::FileDiff;

use crate::blame::GitBlame;

/// Options for [`GitService::get_log_commit`].
///
/// # Examples
///
/// ```
/// use margin_git::service::LogOptions;
///
/// let opts = LogOptions::default();
/// assert!(!opts.previous);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Also resolve the revision of the file before the returned commit,
    /// filling [`Commit::previous_sha`].
    pub previous: bool,
}

/// Read-only queries against a repository.
///
/// Every method resolves to `Ok(None)` (or `Ok(false)`) when the answer is
/// simply absent, e.g. for untracked files or files without history. `Err`
/// is reserved for failures of the repository itself.
///
/// Futures returned by implementations are polled on a single thread and
/// need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait GitService {
    /// The most recent commit that touched `path`.
    async fn get_log_commit(
        &self,
        repo_path: &Path,
        path: &Path,
        options: LogOptions,
    ) -> Result<Option<Commit>, MarginError>;

    /// Diff of the working copy of `uri` against the file at `since_sha`.
    ///
    /// `None` for `since_sha` compares against an empty file.
    async fn get_diff_for_file(
        &self,
        uri: &GitUri,
        since_sha: Option<&str>,
    ) -> Result<Option<FileDiff>, MarginError>;

    /// Whether the repository has at least one remote configured.
    async fn has_remote(&self, repo_path: &Path) -> Result<bool, MarginError>;

    /// Line-by-line authorship of the working copy of `uri`.
    async fn get_blame_for_file(&self, uri: &GitUri) -> Result<Option<GitBlame>, MarginError>;
}
