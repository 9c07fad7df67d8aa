//! The editor surface annotations are painted on.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use margin_core::{DecorationRequest, MarginError, Position, Range};

/// Names a decoration layer.
///
/// Setting decorations for a type replaces everything previously set for
/// that same type; other types are untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecorationType(String);

impl DecorationType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DecorationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live document open in an editor.
pub trait TextEditor {
    /// Number of lines in the document.
    fn line_count(&self) -> u32;

    /// Length of `line` in characters. Only called with valid lines.
    fn line_len(&self, line: u32) -> u32;

    /// Replace the decorations of `decoration_type` with `decorations`.
    fn set_decorations(&self, decoration_type: &DecorationType, decorations: &[DecorationRequest]);

    /// Clamp a range to the document's bounds.
    ///
    /// Lines past the end collapse onto the last line and characters past the
    /// end of a line onto its length.
    fn validate_range(&self, range: Range) -> Range {
        Range::new(self.validate_position(range.start), self.validate_position(range.end))
    }

    /// Clamp a position to the document's bounds.
    fn validate_position(&self, position: Position) -> Position {
        let count = self.line_count();
        if count == 0 {
            return Position::new(0, 0);
        }
        let line = position.line.min(count - 1);
        Position::new(line, position.character.min(self.line_len(line)))
    }

    /// The validated whole-line range of a possibly out-of-bounds line.
    ///
    /// Negative lines clamp to the first line.
    fn validate_line(&self, line: i64) -> Range {
        let line = u32::try_from(line.max(0)).unwrap_or(u32::MAX);
        self.validate_range(Range::whole_line(line))
    }
}

/// In-memory document that records the decorations applied to it.
///
/// Used by the CLI to render annotations without an editor, and in tests.
///
/// # Examples
///
/// ```
/// use margin_annotations::editor::{DecorationType, TextBuffer, TextEditor};
/// use margin_core::{DecorationRequest, Range};
///
/// let buffer = TextBuffer::from_text("fn main() {}\n");
/// let highlight = DecorationType::new("highlight");
/// let range = buffer.validate_line(7);
/// assert_eq!(range.start.line, 0);
/// assert_eq!(range.end.character, 12);
///
/// buffer.set_decorations(&highlight, &[DecorationRequest { range, hover_message: None }]);
/// assert_eq!(buffer.decorations(&highlight).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct TextBuffer {
    lines: Vec<String>,
    applied: RefCell<HashMap<DecorationType, Vec<DecorationRequest>>>,
    apply_calls: Cell<usize>,
}

impl TextBuffer {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    /// Read a document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`MarginError::FileNotFound`] if `path` does not exist, or
    /// [`MarginError::Io`] if it cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, MarginError> {
        if !path.exists() {
            return Err(MarginError::FileNotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }

    /// Text of `line`, if it exists.
    pub fn line(&self, line: u32) -> Option<&str> {
        self.lines.get(line as usize).map(String::as_str)
    }

    /// The decorations currently set for `decoration_type`.
    pub fn decorations(&self, decoration_type: &DecorationType) -> Vec<DecorationRequest> {
        self.applied
            .borrow()
            .get(decoration_type)
            .cloned()
            .unwrap_or_default()
    }

    /// How many times decorations were set, across all types.
    pub fn apply_calls(&self) -> usize {
        self.apply_calls.get()
    }
}

impl TextEditor for TextBuffer {
    fn line_count(&self) -> u32 {
        u32::try_from(self.lines.len()).unwrap_or(u32::MAX)
    }

    fn line_len(&self, line: u32) -> u32 {
        self.line(line)
            .map(|text| u32::try_from(text.chars().count()).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }

    fn set_decorations(&self, decoration_type: &DecorationType, decorations: &[DecorationRequest]) {
        self.apply_calls.set(self.apply_calls.get() + 1);
        let mut applied = self.applied.borrow_mut();
        if decorations.is_empty() {
            applied.remove(decoration_type);
        } else {
            applied.insert(decoration_type.clone(), decorations.to_vec());
        }
    }
}
