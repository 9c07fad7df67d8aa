//! Turns mapped diff lines into decoration requests.

use std::cell::OnceCell;

use chrono::{DateTime, Utc};
use margin_core::{
    Commit, DateStyle, DecorationRequest, FileAnnotationType, GitUri, HoverConfig, MarginConfig,
    MarkdownString, Range,
};
use margin_difflens::diff::DiffLine;

use crate::hover::{commit_hover_message, diff_hover_message, HoverContext};

/// Configuration snapshot taken once per annotation pass.
///
/// # Examples
///
/// ```
/// use margin_annotations::render::RenderOptions;
/// use margin_core::MarginConfig;
///
/// let options = RenderOptions::from_config(&MarginConfig::default());
/// assert!(options.hover.details);
/// assert_eq!(options.date_format, "%B %-d, %Y %-I:%M%P");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub hover: HoverConfig,
    pub date_style: DateStyle,
    pub date_format: String,
    pub annotation_type: FileAnnotationType,
}

impl RenderOptions {
    pub fn from_config(config: &MarginConfig) -> Self {
        Self {
            hover: config.annotations.file.recent_changes.hover,
            date_style: config.default_date_style,
            date_format: config.date_format().to_string(),
            annotation_type: config.blame.file.annotation_type,
        }
    }
}

/// Builds the two stacked decorations for each changed line of one commit.
///
/// The commit summary is the same for every line, so it is rendered at most
/// once per builder.
#[derive(Debug)]
pub struct AnnotationRenderRequestBuilder<'a> {
    commit: &'a Commit,
    uri: &'a GitUri,
    options: &'a RenderOptions,
    has_remote: bool,
    now: DateTime<Utc>,
    summary: OnceCell<MarkdownString>,
}

impl<'a> AnnotationRenderRequestBuilder<'a> {
    pub fn new(commit: &'a Commit, uri: &'a GitUri, options: &'a RenderOptions, has_remote: bool) -> Self {
        Self::at(commit, uri, options, has_remote, Utc::now())
    }

    /// Like [`new`](Self::new), with relative dates measured from `now`.
    pub fn at(
        commit: &'a Commit,
        uri: &'a GitUri,
        options: &'a RenderOptions,
        has_remote: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            commit,
            uri,
            options,
            has_remote,
            now,
            summary: OnceCell::new(),
        }
    }

    /// Base and highlight requests for `line` at the already validated `range`.
    ///
    /// The base carries the commit summary when `hover.details` is on, the
    /// highlight carries the line's diff when `hover.changes` is on. Both are
    /// always returned, base first.
    pub fn build(&self, line: &DiffLine, range: Range) -> [DecorationRequest; 2] {
        let base = DecorationRequest {
            range,
            hover_message: self.options.hover.details.then(|| self.summary().clone()),
        };

        let highlight = DecorationRequest {
            range,
            hover_message: if self.options.hover.changes {
                diff_hover_message(self.commit, self.uri, line)
            } else {
                None
            },
        };

        [base, highlight]
    }

    fn summary(&self) -> &MarkdownString {
        self.summary.get_or_init(|| {
            let ctx = HoverContext {
                date_style: self.options.date_style,
                date_format: &self.options.date_format,
                has_remote: self.has_remote,
                annotation_type: self.options.annotation_type,
                now: self.now,
            };
            commit_hover_message(self.commit, &ctx)
        })
    }
}
