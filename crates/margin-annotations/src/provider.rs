//! Whole-file annotation providers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Instant;

use margin_core::{
    ConfigurationStore, DecorationRequest, FileAnnotationType, GitUri, MarginError,
};
use margin_git::service::{GitService, LogOptions};
use tracing::{debug, warn};

use crate::editor::{DecorationType, TextEditor};
use crate::render::{AnnotationRenderRequestBuilder, RenderOptions};

/// What the user pointed at when asking for an annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationHint {
    Sha(String),
    Line(u32),
}

/// A provider of one kind of whole-file annotation for one editor.
///
/// Futures are driven on the editor's thread and need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait AnnotationProvider {
    /// The annotation currently shown, if any.
    fn annotation_type(&self) -> Option<FileAnnotationType>;

    /// Compute and apply the annotation. `false` means nothing was applied.
    async fn provide_annotation(&self, hint: Option<&AnnotationHint>) -> bool;

    /// Move the annotation's selection to `hint`.
    async fn selection(&self, hint: Option<&AnnotationHint>);

    /// Whether the provider can still annotate its editor.
    async fn validate(&self) -> bool;

    /// Remove applied decorations and forget the annotation type.
    fn clear(&self);
}

/// Highlights the lines changed since the file's previous revision.
///
/// Each changed line gets two decorations on the highlight layer: a base
/// carrying the commit summary and a highlight carrying the line's diff.
///
/// Overlapping calls are resolved by generation: only the newest call may
/// apply decorations, older ones finish with `false`.
pub struct RecentChangesAnnotationProvider<G, E> {
    git: Rc<G>,
    editor: Rc<E>,
    uri: GitUri,
    highlight: DecorationType,
    config: Rc<ConfigurationStore>,
    generation: Cell<u64>,
    annotation_type: Cell<Option<FileAnnotationType>>,
    decorations: RefCell<Vec<DecorationRequest>>,
}

impl<G: GitService, E: TextEditor> RecentChangesAnnotationProvider<G, E> {
    pub fn new(
        git: Rc<G>,
        editor: Rc<E>,
        uri: GitUri,
        highlight: DecorationType,
        config: Rc<ConfigurationStore>,
    ) -> Self {
        Self {
            git,
            editor,
            uri,
            highlight,
            config,
            generation: Cell::new(0),
            annotation_type: Cell::new(None),
            decorations: RefCell::new(Vec::new()),
        }
    }

    pub fn uri(&self) -> &GitUri {
        &self.uri
    }

    /// The batch applied by the last successful pass.
    pub fn decorations(&self) -> Vec<DecorationRequest> {
        self.decorations.borrow().clone()
    }

    fn next_generation(&self) -> u64 {
        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);
        generation
    }

    fn is_superseded(&self, generation: u64) -> bool {
        let superseded = self.generation.get() != generation;
        if superseded {
            debug!(uri = %self.uri, generation, "recent changes pass superseded");
        }
        superseded
    }

    async fn annotate(&self, generation: u64) -> Result<bool, MarginError> {
        let commit = self
            .git
            .get_log_commit(
                &self.uri.repo_path,
                self.uri.relative_path(),
                LogOptions { previous: true },
            )
            .await?;
        if self.is_superseded(generation) {
            return Ok(false);
        }
        let Some(commit) = commit else {
            debug!(uri = %self.uri, "no commit touches file");
            return Ok(false);
        };

        let diff = self
            .git
            .get_diff_for_file(&self.uri, commit.previous_sha.as_deref())
            .await?;
        if self.is_superseded(generation) {
            return Ok(false);
        }
        let Some(diff) = diff else {
            debug!(uri = %self.uri, sha = commit.short_sha(), "no diff against previous revision");
            return Ok(false);
        };

        let start = Instant::now();
        let options = RenderOptions::from_config(&self.config.get());

        let has_remote = if options.hover.details {
            let has_remote = self.git.has_remote(&commit.repo_path).await?;
            if self.is_superseded(generation) {
                return Ok(false);
            }
            has_remote
        } else {
            false
        };

        let builder = AnnotationRenderRequestBuilder::new(&commit, &self.uri, &options, has_remote);
        let mut decorations = Vec::new();
        for chunk in &diff.chunks {
            for (line, diff_line) in chunk.changed_lines() {
                let range = self.editor.validate_line(line);
                decorations.extend(builder.build(diff_line, range));
            }
        }

        self.editor.set_decorations(&self.highlight, &decorations);
        let count = decorations.len();
        *self.decorations.borrow_mut() = decorations;

        debug!(
            uri = %self.uri,
            decorations = count,
            duration_ms = start.elapsed().as_millis() as u64,
            "computed recent changes annotations"
        );
        Ok(true)
    }
}

impl<G: GitService, E: TextEditor> AnnotationProvider for RecentChangesAnnotationProvider<G, E> {
    fn annotation_type(&self) -> Option<FileAnnotationType> {
        self.annotation_type.get()
    }

    async fn provide_annotation(&self, _hint: Option<&AnnotationHint>) -> bool {
        let generation = self.next_generation();
        self.annotation_type.set(Some(FileAnnotationType::RecentChanges));

        match self.annotate(generation).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!(uri = %self.uri, error = %e, "failed to compute recent changes annotations");
                false
            }
        }
    }

    async fn selection(&self, _hint: Option<&AnnotationHint>) {}

    async fn validate(&self) -> bool {
        true
    }

    fn clear(&self) {
        // Invalidates any pass still in flight
        self.next_generation();
        self.annotation_type.set(None);

        let had_decorations = !self.decorations.borrow().is_empty();
        if had_decorations {
            self.editor.set_decorations(&self.highlight, &[]);
            self.decorations.borrow_mut().clear();
        }
    }
}
