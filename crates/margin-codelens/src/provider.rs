//! Code lens providers and the git-backed lenses.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use chrono::Utc;
use margin_annotations::hover::{format_date, SHOW_COMMIT_DETAILS_COMMAND};
use margin_core::{ConfigurationStore, Disposable, EventEmitter, GitUri, MarginError, Position, Range};
use margin_git::blame::GitBlame;
use margin_git::service::GitService;
use serde::{Deserialize, Serialize};

/// Why a provider is asked to recompute its lenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetReason {
    /// The document was saved.
    Saved,
    /// Unsaved edits have settled.
    Idle,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::Saved => write!(f, "saved"),
            ResetReason::Idle => write!(f, "idle"),
        }
    }
}

/// Which documents a provider serves, by uri scheme.
///
/// # Examples
///
/// ```
/// use margin_codelens::provider::DocumentSelector;
///
/// let selector = DocumentSelector::new(["file", "git"]);
/// assert!(selector.matches("git"));
/// assert!(!selector.matches("untitled"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSelector {
    schemes: Vec<String>,
}

impl DocumentSelector {
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, scheme: &str) -> bool {
        self.schemes.iter().any(|s| s == scheme)
    }
}

/// The lifecycle surface of a code lens provider.
pub trait CodeLensProvider {
    /// Drop computed lenses so they are recomputed on next request.
    fn reset(&self, reason: Option<ResetReason>);

    /// Called whenever the provider's lenses become stale.
    fn on_did_change_code_lenses(&self, listener: Box<dyn Fn()>) -> Disposable;
}

/// What a lens reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CodeLensKind {
    RecentChange,
    Authors,
}

/// A resolved lens anchored in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeLens {
    pub range: Range,
    pub kind: CodeLensKind,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Provides document-level recent-change and authors lenses from blame.
///
/// Lenses are cached per document. A reset clears the cache and announces
/// the change once; further resets before the next request only update the
/// recorded reason. Lenses computed from a fetch that a reset overtook are
/// returned but never cached.
pub struct GitCodeLensProvider<G> {
    git: Rc<G>,
    config: Rc<ConfigurationStore>,
    cache: RefCell<HashMap<GitUri, Vec<CodeLens>>>,
    generation: Cell<u64>,
    reset_pending: Cell<bool>,
    last_reset: Cell<Option<ResetReason>>,
    resets: Cell<usize>,
    on_did_change: EventEmitter<()>,
}

impl<G: GitService> GitCodeLensProvider<G> {
    pub fn new(git: Rc<G>, config: Rc<ConfigurationStore>) -> Self {
        Self {
            git,
            config,
            cache: RefCell::new(HashMap::new()),
            generation: Cell::new(0),
            reset_pending: Cell::new(false),
            last_reset: Cell::new(None),
            resets: Cell::new(0),
            on_did_change: EventEmitter::new(),
        }
    }

    /// Schemes of documents that can carry git lenses.
    pub fn selector() -> DocumentSelector {
        DocumentSelector::new(["file", "git"])
    }

    /// Reason passed to the most recent reset.
    pub fn last_reset_reason(&self) -> Option<ResetReason> {
        self.last_reset.get()
    }

    /// Number of resets received.
    pub fn reset_count(&self) -> usize {
        self.resets.get()
    }

    /// Lenses for the document at `uri`, from cache when possible.
    ///
    /// # Errors
    ///
    /// Propagates query failures from the git service.
    pub async fn provide_code_lenses(&self, uri: &GitUri) -> Result<Vec<CodeLens>, MarginError> {
        self.reset_pending.set(false);

        if let Some(lenses) = self.cache.borrow().get(uri) {
            return Ok(lenses.clone());
        }

        let generation = self.generation.get();
        let blame = self.git.get_blame_for_file(uri).await?;
        let lenses = match blame {
            Some(blame) => self.lenses_for(&blame),
            None => Vec::new(),
        };

        if self.generation.get() != generation {
            tracing::debug!(uri = %uri, "reset during blame; not caching code lenses");
            return Ok(lenses);
        }

        tracing::debug!(uri = %uri, lenses = lenses.len(), "computed code lenses");
        self.cache.borrow_mut().insert(uri.clone(), lenses.clone());
        Ok(lenses)
    }

    fn lenses_for(&self, blame: &GitBlame) -> Vec<CodeLens> {
        let config = self.config.get();
        let range = Range::new(Position::new(0, 0), Position::new(0, 0));
        let mut lenses = Vec::new();

        if config.code_lens.recent_change.enabled {
            if let Some(commit) = blame.most_recent_commit() {
                let date = format_date(
                    commit.date,
                    Utc::now(),
                    config.default_date_style,
                    config.date_format(),
                );
                lenses.push(CodeLens {
                    range,
                    kind: CodeLensKind::RecentChange,
                    title: format!("{}, {}", commit.author, date),
                    command: (!commit.is_uncommitted()).then(|| SHOW_COMMIT_DETAILS_COMMAND.to_string()),
                });
            }
        }

        if config.code_lens.authors.enabled {
            if let Some(title) = authors_title(blame) {
                lenses.push(CodeLens {
                    range,
                    kind: CodeLensKind::Authors,
                    title,
                    command: None,
                });
            }
        }

        lenses
    }
}

impl<G> CodeLensProvider for GitCodeLensProvider<G> {
    fn reset(&self, reason: Option<ResetReason>) {
        self.resets.set(self.resets.get() + 1);
        self.last_reset.set(reason);
        self.generation.set(self.generation.get() + 1);
        self.cache.borrow_mut().clear();

        if self.reset_pending.replace(true) {
            return;
        }
        self.on_did_change.fire(&());
    }

    fn on_did_change_code_lenses(&self, listener: Box<dyn Fn()>) -> Disposable {
        self.on_did_change.subscribe(move |_| listener())
    }
}

/// "1 author (alice)" or "3 authors (alice and others)".
fn authors_title(blame: &GitBlame) -> Option<String> {
    let top = blame.authors.first()?;
    Some(match blame.authors.len() {
        1 => format!("1 author ({})", top.name),
        n => format!("{n} authors ({} and others)", top.name),
    })
}
