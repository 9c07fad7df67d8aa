//! Maps a chunk's current-side lines onto document line numbers.

use std::slice;

use crate::diff::{DiffChunk, DiffLine, LineState};

/// Lazily yields `(document_line, diff_line)` for every line of a chunk that
/// differs from the previous revision.
///
/// `document_line` is zero-based and may fall outside the document if the
/// diff is stale; callers validate it against the live document.
///
/// # Examples
///
/// ```
/// use margin_difflens::diff::{ChunkPosition, DiffChunk, DiffLine, LineState};
/// use margin_difflens::mapper::changed_lines;
///
/// let chunk = DiffChunk {
///     current_position: ChunkPosition { start: 3, end: 4 },
///     previous_position: ChunkPosition { start: 3, end: 3 },
///     lines: vec![
///         DiffLine::content("fn a() {}", LineState::Unchanged),
///         DiffLine::content("fn b() {}", LineState::Added),
///     ],
/// };
/// let lines: Vec<i64> = changed_lines(&chunk).map(|(line, _)| line).collect();
/// assert_eq!(lines, vec![3]);
/// ```
#[derive(Debug, Clone)]
pub struct ChangedLines<'a> {
    lines: slice::Iter<'a, DiffLine>,
    counter: i64,
}

impl<'a> Iterator for ChangedLines<'a> {
    type Item = (i64, &'a DiffLine);

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            let DiffLine::Content(content) = line else {
                continue;
            };

            self.counter += 1;

            if content.state == LineState::Unchanged {
                continue;
            }
            return Some((self.counter, line));
        }
        None
    }
}

/// Iterate the differing lines of `chunk` in chunk order.
///
/// The counter starts two below the chunk's 1-based start so that the first
/// real line lands on `start - 1`, its zero-based index.
pub fn changed_lines(chunk: &DiffChunk) -> ChangedLines<'_> {
    ChangedLines {
        lines: chunk.lines.iter(),
        counter: i64::from(chunk.current_position.start) - 2,
    }
}

impl DiffChunk {
    /// See [`changed_lines`].
    pub fn changed_lines(&self) -> ChangedLines<'_> {
        changed_lines(self)
    }
}
