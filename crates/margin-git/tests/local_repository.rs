//! Integration test: log, diff, remote and blame queries against a scratch repository.

use std::fs;
use std::path::Path;

use git2::{Repository, Signature, Time};
use margin_core::{GitUri, UNCOMMITTED_SHA};
use margin_difflens::diff::LineState;
use margin_git::repository::LocalGitService;
use margin_git::service::{GitService, LogOptions};

fn commit_file(repo: &Repository, file: &str, contents: &str, author: &str, when: i64) -> String {
    let workdir = repo.workdir().unwrap();
    fs::write(workdir.join(file), contents).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(file)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let sig = Signature::new(author, &format!("{author}@example.com"), &Time::new(when, 0)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, &format!("update {file}"), &tree, &parents)
        .unwrap()
        .to_string()
}

struct Fixture {
    dir: tempfile::TempDir,
    first: String,
    second: String,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    let first = commit_file(&repo, "notes.txt", "a\nb\nc\n", "alice", 1_700_000_000);
    commit_file(&repo, "other.txt", "unrelated\n", "carol", 1_700_000_500);
    let second = commit_file(&repo, "notes.txt", "a\nB\nc\nd\n", "bob", 1_700_001_000);

    // Uncommitted edit on top of the last commit
    fs::write(dir.path().join("notes.txt"), "a\nB\nc\nd\ne\n").unwrap();

    Fixture { dir, first, second }
}

#[tokio::test]
async fn log_commit_resolves_previous_revision_of_the_file() {
    let fx = fixture();
    let git = LocalGitService::new();

    let commit = git
        .get_log_commit(fx.dir.path(), Path::new("notes.txt"), LogOptions { previous: true })
        .await
        .unwrap()
        .expect("file has history");

    assert_eq!(commit.sha, fx.second);
    assert_eq!(commit.previous_sha.as_deref(), Some(fx.first.as_str()));
    assert_eq!(commit.author, "bob");
    assert_eq!(commit.date.timestamp(), 1_700_001_000);
}

#[tokio::test]
async fn log_commit_without_previous_leaves_it_empty() {
    let fx = fixture();
    let git = LocalGitService::new();

    let commit = git
        .get_log_commit(fx.dir.path(), Path::new("notes.txt"), LogOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(commit.sha, fx.second);
    assert!(commit.previous_sha.is_none());
}

#[tokio::test]
async fn log_commit_for_untracked_file_is_none() {
    let fx = fixture();
    fs::write(fx.dir.path().join("scratch.txt"), "tmp\n").unwrap();
    let git = LocalGitService::new();

    let commit = git
        .get_log_commit(fx.dir.path(), Path::new("scratch.txt"), LogOptions { previous: true })
        .await
        .unwrap();
    assert!(commit.is_none());
}

#[tokio::test]
async fn diff_against_previous_revision_maps_changed_lines() {
    let fx = fixture();
    let git = LocalGitService::new();
    let uri = GitUri::new(fx.dir.path(), "notes.txt");

    let diff = git
        .get_diff_for_file(&uri, Some(&fx.first))
        .await
        .unwrap()
        .expect("working copy differs");

    assert_eq!(diff.chunks.len(), 1);
    let mapped: Vec<(i64, Option<LineState>)> = diff.chunks[0]
        .changed_lines()
        .map(|(line, diff_line)| (line, diff_line.state()))
        .collect();
    assert_eq!(
        mapped,
        vec![
            (1, Some(LineState::Changed)),
            (3, Some(LineState::Added)),
            (4, Some(LineState::Added)),
        ]
    );
}

#[tokio::test]
async fn diff_of_unchanged_file_is_none() {
    let fx = fixture();
    let git = LocalGitService::new();
    let uri = GitUri::new(fx.dir.path(), "other.txt");

    let diff = git.get_diff_for_file(&uri, Some(&fx.second)).await.unwrap();
    assert!(diff.is_none());
}

#[tokio::test]
async fn has_remote_reflects_configured_remotes() {
    let fx = fixture();
    let git = LocalGitService::new();
    assert!(!git.has_remote(fx.dir.path()).await.unwrap());

    let repo = Repository::open(fx.dir.path()).unwrap();
    repo.remote("origin", "https://example.com/notes.git").unwrap();
    assert!(git.has_remote(fx.dir.path()).await.unwrap());
}

#[tokio::test]
async fn has_remote_outside_repository_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let git = LocalGitService::new();
    assert!(git.has_remote(dir.path()).await.is_err());
}

#[tokio::test]
async fn blame_attributes_working_copy_lines() {
    let fx = fixture();
    let git = LocalGitService::new();
    let uri = GitUri::new(fx.dir.path(), "notes.txt");

    let blame = git.get_blame_for_file(&uri).await.unwrap().expect("tracked file");

    assert_eq!(blame.lines.len(), 5);
    assert_eq!(blame.lines[0].sha, fx.first);
    assert_eq!(blame.lines[1].sha, fx.second);
    assert_eq!(blame.lines[4].sha, UNCOMMITTED_SHA);

    let names: Vec<&str> = blame.authors.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["alice", "bob", "You"]);
    assert_eq!(blame.most_recent_commit().map(|c| c.is_uncommitted()), Some(true));
}

#[tokio::test]
async fn blame_for_untracked_file_is_none() {
    let fx = fixture();
    fs::write(fx.dir.path().join("scratch.txt"), "tmp\n").unwrap();
    let git = LocalGitService::new();

    let blame = git
        .get_blame_for_file(&GitUri::new(fx.dir.path(), "scratch.txt"))
        .await
        .unwrap();
    assert!(blame.is_none());
}
