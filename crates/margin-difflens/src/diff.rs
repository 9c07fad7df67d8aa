use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a line in the current revision relates to the previous one.
///
/// # Examples
///
/// ```
/// use margin_difflens::diff::LineState;
///
/// assert_eq!(LineState::Changed.to_string(), "changed");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineState {
    Unchanged,
    Added,
    Removed,
    Changed,
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineState::Unchanged => write!(f, "unchanged"),
            LineState::Added => write!(f, "added"),
            LineState::Removed => write!(f, "removed"),
            LineState::Changed => write!(f, "changed"),
        }
    }
}

/// Text of a diff line plus its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineContent {
    /// Line text in the current revision (without the diff marker).
    pub text: String,
    pub state: LineState,
    /// Line text in the previous revision, for [`LineState::Changed`] lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
}

/// One entry of a chunk's current-side line sequence.
///
/// A `Placeholder` keeps the current and previous sides aligned where the
/// previous revision had lines that no longer exist. It does not occupy a
/// line in the current document.
///
/// # Examples
///
/// ```
/// use margin_difflens::diff::{DiffLine, LineState};
///
/// let line = DiffLine::content("let x = 1;", LineState::Added);
/// assert_eq!(line.state(), Some(LineState::Added));
/// assert_eq!(DiffLine::Placeholder.state(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DiffLine {
    Placeholder,
    Content(LineContent),
}

impl DiffLine {
    pub fn content(text: impl Into<String>, state: LineState) -> Self {
        DiffLine::Content(LineContent {
            text: text.into(),
            state,
            previous: None,
        })
    }

    /// A [`LineState::Changed`] line that replaced `previous`.
    pub fn changed(text: impl Into<String>, previous: impl Into<String>) -> Self {
        DiffLine::Content(LineContent {
            text: text.into(),
            state: LineState::Changed,
            previous: Some(previous.into()),
        })
    }

    pub fn state(&self) -> Option<LineState> {
        match self {
            DiffLine::Placeholder => None,
            DiffLine::Content(content) => Some(content.state),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            DiffLine::Placeholder => None,
            DiffLine::Content(content) => Some(&content.text),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, DiffLine::Placeholder)
    }
}

/// Line span of a chunk on one side of the diff.
///
/// `start` is 1-based; `end` is the last line covered (equal to `start` for
/// empty spans).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPosition {
    pub start: u32,
    pub end: u32,
}

impl ChunkPosition {
    /// Span of a hunk range `start,count`; `None` if the end does not fit in
    /// a `u32`.
    pub fn from_hunk_range(start: u32, count: u32) -> Option<Self> {
        let end = start.checked_add(count.saturating_sub(1))?;
        Some(Self { start, end })
    }
}

/// A contiguous block of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffChunk {
    pub current_position: ChunkPosition,
    pub previous_position: ChunkPosition,
    /// Current-side lines, in order, with placeholders for removed lines.
    pub lines: Vec<DiffLine>,
}

/// A complete diff for a single file.
///
/// # Examples
///
/// ```
/// use margin_difflens::parser::parse_unified_diff;
///
/// let diff = concat!(
///     "diff --git a/hello.rs b/hello.rs\n",
///     "--- a/hello.rs\n",
///     "+++ b/hello.rs\n",
///     "@@ -1,2 +1,3 @@\n",
///     " fn main() {\n",
///     "+    println!(\"hello\");\n",
///     " }\n",
/// );
/// let files = parse_unified_diff(diff).unwrap();
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].chunks[0].lines.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// Path in the old version.
    pub old_path: PathBuf,
    /// Path in the new version.
    pub new_path: PathBuf,
    /// Parsed chunks for this file.
    pub chunks: Vec<DiffChunk>,
    /// Whether this is a newly created file.
    pub is_new_file: bool,
    /// Whether this file was deleted.
    pub is_deleted_file: bool,
    /// Whether this file was renamed.
    pub is_rename: bool,
}

impl FileDiff {
    pub(crate) fn empty() -> Self {
        Self {
            old_path: PathBuf::new(),
            new_path: PathBuf::new(),
            chunks: Vec::new(),
            is_new_file: false,
            is_deleted_file: false,
            is_rename: false,
        }
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} chunks)",
            self.new_path.display(),
            self.chunks.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_position_from_hunk_range() {
        assert_eq!(
            ChunkPosition::from_hunk_range(10, 3),
            Some(ChunkPosition { start: 10, end: 12 })
        );
        assert_eq!(
            ChunkPosition::from_hunk_range(5, 0),
            Some(ChunkPosition { start: 5, end: 5 })
        );
        assert_eq!(ChunkPosition::from_hunk_range(u32::MAX, 2), None);
    }

    #[test]
    fn diff_line_serializes_with_kind_tag() {
        let json = serde_json::to_value(DiffLine::changed("new", "old")).unwrap();
        assert_eq!(json["kind"], "content");
        assert_eq!(json["state"], "changed");
        assert_eq!(json["previous"], "old");

        let json = serde_json::to_value(DiffLine::Placeholder).unwrap();
        assert_eq!(json["kind"], "placeholder");
    }

    #[test]
    fn file_diff_display() {
        let mut diff = FileDiff::empty();
        diff.new_path = PathBuf::from("src/lib.rs");
        assert_eq!(diff.to_string(), "src/lib.rs (0 chunks)");
    }
}
