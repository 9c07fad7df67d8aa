//! Document state events consumed by the code lens controller.

use std::cell::RefCell;
use std::collections::HashMap;

use margin_core::{Disposable, EventEmitter, GitUri};

/// Whether a document can currently be blamed, and whether its unsaved
/// edits have settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentState {
    pub uri: GitUri,
    pub is_blameable: bool,
    pub is_dirty_idle: bool,
}

/// A document became blameable or stopped being blameable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameStateChangeEvent {
    pub uri: GitUri,
    pub blameable: bool,
}

/// A document's dirty-idle flag flipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirtyIdleStateChangeEvent {
    pub document: DocumentState,
}

/// Source of document state transitions.
pub trait DocumentTracker {
    fn on_did_change_blame_state(&self, listener: Box<dyn Fn(&BlameStateChangeEvent)>)
        -> Disposable;

    fn on_did_change_dirty_idle_state(
        &self,
        listener: Box<dyn Fn(&DirtyIdleStateChangeEvent)>,
    ) -> Disposable;
}

/// In-memory tracker driven by explicit edit, idle and save notifications.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use margin_codelens::tracker::{DocumentStateTracker, DocumentTracker};
/// use margin_core::GitUri;
///
/// let tracker = DocumentStateTracker::new();
/// let uri = GitUri::new("/repo", "src/lib.rs");
/// tracker.open(&uri, true);
///
/// let saves = Rc::new(Cell::new(0));
/// let s = saves.clone();
/// let _sub = tracker.on_did_change_blame_state(Box::new(move |e| {
///     if e.blameable { s.set(s.get() + 1) }
/// }));
///
/// tracker.edited(&uri);
/// tracker.saved(&uri);
/// assert_eq!(saves.get(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DocumentStateTracker {
    documents: RefCell<HashMap<GitUri, DocumentState>>,
    blame_state: EventEmitter<BlameStateChangeEvent>,
    dirty_idle: EventEmitter<DirtyIdleStateChangeEvent>,
}

impl DocumentStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `uri` without firing events.
    pub fn open(&self, uri: &GitUri, blameable: bool) {
        self.documents.borrow_mut().insert(
            uri.clone(),
            DocumentState {
                uri: uri.clone(),
                is_blameable: blameable,
                is_dirty_idle: false,
            },
        );
    }

    pub fn close(&self, uri: &GitUri) {
        self.documents.borrow_mut().remove(uri);
    }

    pub fn state(&self, uri: &GitUri) -> Option<DocumentState> {
        self.documents.borrow().get(uri).cloned()
    }

    /// The document has unsaved edits that blame cannot account for yet.
    pub fn edited(&self, uri: &GitUri) {
        self.set_dirty_idle(uri, false);
        self.set_blameable(uri, false);
    }

    /// Unsaved edits have settled; blame of the buffer is possible again.
    pub fn idle(&self, uri: &GitUri) {
        self.set_blameable(uri, true);
        self.set_dirty_idle(uri, true);
    }

    /// The document was written to disk.
    pub fn saved(&self, uri: &GitUri) {
        self.set_dirty_idle(uri, false);
        self.set_blameable(uri, true);
    }

    /// Update the blameable flag, firing when it changes.
    pub fn set_blameable(&self, uri: &GitUri, blameable: bool) {
        let changed = self.update(uri, |state| {
            std::mem::replace(&mut state.is_blameable, blameable) != blameable
        });
        if changed.is_some() {
            self.blame_state.fire(&BlameStateChangeEvent {
                uri: uri.clone(),
                blameable,
            });
        }
    }

    /// Update the dirty-idle flag, firing when it changes.
    pub fn set_dirty_idle(&self, uri: &GitUri, dirty_idle: bool) {
        let changed = self.update(uri, |state| {
            std::mem::replace(&mut state.is_dirty_idle, dirty_idle) != dirty_idle
        });
        if let Some(document) = changed {
            self.dirty_idle.fire(&DirtyIdleStateChangeEvent { document });
        }
    }

    pub fn blame_state_listener_count(&self) -> usize {
        self.blame_state.listener_count()
    }

    pub fn dirty_idle_listener_count(&self) -> usize {
        self.dirty_idle.listener_count()
    }

    /// Apply `f` to the tracked state; returns the new state if `f` reports
    /// a change. Unknown documents are tracked as blameable and clean.
    fn update(
        &self,
        uri: &GitUri,
        f: impl FnOnce(&mut DocumentState) -> bool,
    ) -> Option<DocumentState> {
        let mut documents = self.documents.borrow_mut();
        let state = documents.entry(uri.clone()).or_insert_with(|| DocumentState {
            uri: uri.clone(),
            is_blameable: true,
            is_dirty_idle: false,
        });
        f(state).then(|| state.clone())
    }
}

impl DocumentTracker for DocumentStateTracker {
    fn on_did_change_blame_state(
        &self,
        listener: Box<dyn Fn(&BlameStateChangeEvent)>,
    ) -> Disposable {
        self.blame_state.subscribe(move |e| listener(e))
    }

    fn on_did_change_dirty_idle_state(
        &self,
        listener: Box<dyn Fn(&DirtyIdleStateChangeEvent)>,
    ) -> Disposable {
        self.dirty_idle.subscribe(move |e| listener(e))
    }
}
