//! Integration test: controller-managed git lenses over a scratch repository.

use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use git2::{Repository, Signature, Time};
use margin_codelens::controller::{CodeLensController, ControllerContext};
use margin_codelens::provider::{CodeLensKind, CodeLensProvider, GitCodeLensProvider, ResetReason};
use margin_codelens::registry::{ContextKeys, ProviderRegistry};
use margin_codelens::tracker::DocumentStateTracker;
use margin_core::{ConfigurationStore, GitUri, MarginConfig};
use margin_git::repository::LocalGitService;

fn commit_as(repo: &Repository, contents: &str, author: &str, when: i64) {
    let workdir = repo.workdir().unwrap();
    fs::write(workdir.join("lib.rs"), contents).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new("lib.rs")).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let sig = Signature::new(author, &format!("{author}@example.com"), &Time::new(when, 0)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, "edit", &tree, &parents)
        .unwrap();
}

#[tokio::test]
async fn lenses_follow_saves() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit_as(&repo, "fn a() {}\nfn b() {}\n", "alice", 1_700_000_000);
    commit_as(&repo, "fn a() {}\nfn b() { 1 }\nfn c() {}\n", "bob", 1_700_086_400);

    let mut initial = MarginConfig::default();
    initial.default_date_style = margin_core::DateStyle::Absolute;
    initial.default_date_format = Some("%Y-%m-%d".into());
    let config = Rc::new(ConfigurationStore::new(initial));
    let tracker = Rc::new(DocumentStateTracker::new());
    let registry = ProviderRegistry::new();
    let git = Rc::new(LocalGitService::new());

    let store = Rc::clone(&config);
    let controller = CodeLensController::new(
        ControllerContext {
            config: Rc::clone(&config),
            tracker: tracker.clone(),
            registry: Rc::new(registry.clone()),
            context: Rc::new(ContextKeys::new()),
        },
        GitCodeLensProvider::<LocalGitService>::selector(),
        move || Rc::new(GitCodeLensProvider::new(Rc::clone(&git), Rc::clone(&store))),
    );

    let uri = GitUri::new(dir.path(), "lib.rs");
    tracker.open(&uri, true);

    let provider = controller.provider().expect("enabled by default");
    assert_eq!(registry.providers_for("file").len(), 1);

    let lenses = provider.provide_code_lenses(&uri).await.unwrap();
    assert_eq!(lenses.len(), 2);
    assert_eq!(lenses[0].kind, CodeLensKind::RecentChange);
    assert_eq!(lenses[0].title, "bob, 2023-11-15");
    assert_eq!(lenses[1].title, "2 authors (bob and others)");

    let changes = Rc::new(Cell::new(0));
    let c = Rc::clone(&changes);
    let _sub = provider.on_did_change_code_lenses(Box::new(move || c.set(c.get() + 1)));

    // Uncommitted edit, then save
    fs::write(dir.path().join("lib.rs"), "fn a() {}\nfn b() { 1 }\nfn c() {}\nfn d() {}\n").unwrap();
    tracker.edited(&uri);
    tracker.saved(&uri);
    assert_eq!(changes.get(), 1);
    assert_eq!(provider.last_reset_reason(), Some(ResetReason::Saved));

    let lenses = provider.provide_code_lenses(&uri).await.unwrap();
    assert!(lenses[0].title.starts_with("You, "));
    assert_eq!(lenses[1].title, "3 authors (bob and others)");
}

#[tokio::test]
async fn untracked_file_has_no_lenses() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit_as(&repo, "fn a() {}\n", "alice", 1_700_000_000);
    fs::write(dir.path().join("scratch.rs"), "fn s() {}\n").unwrap();

    let provider = GitCodeLensProvider::new(
        Rc::new(LocalGitService::new()),
        Rc::new(ConfigurationStore::new(MarginConfig::default())),
    );
    let lenses = provider
        .provide_code_lenses(&GitUri::new(dir.path(), "scratch.rs"))
        .await
        .unwrap();
    assert!(lenses.is_empty());
}
