//! Blame results and author ownership summaries.
//!
//! Summarizes who wrote the lines of a file so the authors code lens can
//! report the number of contributors and the dominant one.

use std::collections::HashMap;

use margin_core::{Commit, GitUri};
use serde::{Deserialize, Serialize};

/// Attribution of one document line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlameLine {
    /// Zero-based line in the current document.
    pub line: u32,
    /// Sha of the commit that last touched the line.
    pub sha: String,
}

/// Per-author share of a file's lines.
///
/// # Examples
///
/// ```
/// use margin_git::blame::AuthorContribution;
///
/// let contrib = AuthorContribution {
///     name: "alice".into(),
///     email: "alice@example.com".into(),
///     lines: 15,
///     ratio: 0.75,
/// };
/// assert!(contrib.ratio > 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorContribution {
    /// Author name.
    pub name: String,
    /// Author email.
    pub email: String,
    /// Lines currently attributed to this author.
    pub lines: u32,
    /// `lines / total_lines` for this file.
    pub ratio: f64,
}

/// Blame for a whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitBlame {
    pub uri: GitUri,
    /// One entry per document line, in line order.
    pub lines: Vec<BlameLine>,
    /// Every commit referenced by `lines`, newest first.
    pub commits: Vec<Commit>,
    /// Authors ordered by share of lines, largest first.
    pub authors: Vec<AuthorContribution>,
}

impl GitBlame {
    /// Build a blame result, sorting commits and summarizing authors.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use margin_core::{Commit, GitUri};
    /// use margin_git::blame::{BlameLine, GitBlame};
    ///
    /// let commit = Commit {
    ///     sha: "aaa".into(),
    ///     previous_sha: None,
    ///     repo_path: "/repo".into(),
    ///     file_name: "a.rs".into(),
    ///     author: "alice".into(),
    ///     email: "alice@example.com".into(),
    ///     date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ///     message: "init".into(),
    /// };
    /// let lines = vec![BlameLine { line: 0, sha: "aaa".into() }];
    /// let blame = GitBlame::new(GitUri::new("/repo", "a.rs"), lines, vec![commit]);
    /// assert_eq!(blame.authors.len(), 1);
    /// assert_eq!(blame.most_recent_commit().unwrap().sha, "aaa");
    /// ```
    pub fn new(uri: GitUri, lines: Vec<BlameLine>, mut commits: Vec<Commit>) -> Self {
        commits.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.sha.cmp(&b.sha)));
        let authors = summarize_authors(&lines, &commits);
        Self {
            uri,
            lines,
            commits,
            authors,
        }
    }

    /// The newest commit that still owns at least one line.
    pub fn most_recent_commit(&self) -> Option<&Commit> {
        self.commits.first()
    }
}

/// Count lines per author and compute each author's share.
///
/// Authors are keyed by `(name, email)`; ties are broken by name so the
/// order is stable.
pub fn summarize_authors(lines: &[BlameLine], commits: &[Commit]) -> Vec<AuthorContribution> {
    let by_sha: HashMap<&str, &Commit> = commits.iter().map(|c| (c.sha.as_str(), c)).collect();

    let mut counts: HashMap<(String, String), u32> = HashMap::new();
    for line in lines {
        let Some(commit) = by_sha.get(line.sha.as_str()) else {
            continue;
        };
        *counts
            .entry((commit.author.clone(), commit.email.clone()))
            .or_insert(0) += 1;
    }

    let total: u32 = counts.values().sum();
    let mut authors: Vec<AuthorContribution> = counts
        .into_iter()
        .map(|((name, email), count)| AuthorContribution {
            name,
            email,
            lines: count,
            ratio: if total == 0 {
                0.0
            } else {
                f64::from(count) / f64::from(total)
            },
        })
        .collect();

    authors.sort_by(|a, b| b.lines.cmp(&a.lines).then_with(|| a.name.cmp(&b.name)));
    authors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn commit(sha: &str, author: &str, day: u32) -> Commit {
        Commit {
            sha: sha.into(),
            previous_sha: None,
            repo_path: "/repo".into(),
            file_name: "a.rs".into(),
            author: author.into(),
            email: format!("{author}@example.com"),
            date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            message: format!("commit {sha}"),
        }
    }

    fn lines(shas: &[&str]) -> Vec<BlameLine> {
        shas.iter()
            .enumerate()
            .map(|(i, sha)| BlameLine {
                line: i as u32,
                sha: (*sha).into(),
            })
            .collect()
    }

    #[test]
    fn authors_are_ranked_by_line_share() {
        let commits = vec![
            commit("a1", "alice", 1),
            commit("b1", "bob", 2),
            commit("a2", "alice", 3),
        ];
        let authors = summarize_authors(&lines(&["a1", "a2", "b1", "a1"]), &commits);
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[0].name, "alice");
        assert_eq!(authors[0].lines, 3);
        assert!((authors[0].ratio - 0.75).abs() < f64::EPSILON);
        assert_eq!(authors[1].name, "bob");
    }

    #[test]
    fn unknown_shas_are_ignored() {
        let commits = vec![commit("a1", "alice", 1)];
        let authors = summarize_authors(&lines(&["a1", "zzz"]), &commits);
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].lines, 1);
        assert!((authors[0].ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_blame_has_no_authors() {
        assert!(summarize_authors(&[], &[]).is_empty());
    }

    #[test]
    fn commits_are_sorted_newest_first() {
        let blame = GitBlame::new(
            GitUri::new("/repo", "a.rs"),
            lines(&["a1", "b1"]),
            vec![commit("a1", "alice", 1), commit("b1", "bob", 9)],
        );
        assert_eq!(blame.most_recent_commit().unwrap().sha, "b1");
    }
}
