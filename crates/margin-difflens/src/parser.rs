use std::collections::VecDeque;
use std::path::PathBuf;

use margin_core::MarginError;

use crate::diff::{ChunkPosition, DiffChunk, DiffLine, FileDiff, LineState};

/// Parse a unified diff string (as produced by `git diff`) into structured [`FileDiff`] entries.
///
/// Handles standard unified diff format including new files, deleted files,
/// renamed files, and binary files (which are skipped).
///
/// Within a chunk, a run of removed lines followed by added lines is paired
/// up: each added line that replaces a removed one becomes
/// [`LineState::Changed`], surplus added lines become [`LineState::Added`],
/// and removed lines left over become [`DiffLine::Placeholder`] entries.
///
/// # Errors
///
/// Returns [`MarginError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use margin_difflens::parser::parse_unified_diff;
///
/// let files = parse_unified_diff("").unwrap();
/// assert!(files.is_empty());
/// ```
pub fn parse_unified_diff(input: &str) -> Result<Vec<FileDiff>, MarginError> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut current_chunk: Option<ChunkBuilder> = None;
    let mut is_binary = false;

    for line in input.lines() {
        if line.starts_with("diff --git ") {
            flush_chunk(&mut current, &mut current_chunk);
            if let Some(file) = current.take() {
                if !is_binary {
                    files.push(file);
                }
            }
            is_binary = false;
            current = Some(FileDiff::empty());
            continue;
        }

        // Patches without a "diff --git" line start at the "---" header
        if line.starts_with("--- ") && current.is_none() {
            current = Some(FileDiff::empty());
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("@@ ") {
            let header = parse_hunk_header(line)?;
            flush_chunk(&mut current, &mut current_chunk);
            current_chunk = Some(ChunkBuilder::new(header));
            continue;
        }

        if line == "\\ No newline at end of file" {
            continue;
        }

        if let Some(chunk) = current_chunk.as_mut().filter(|c| !c.is_complete()) {
            if let Some(text) = line.strip_prefix('+') {
                chunk.push_added(text);
                continue;
            }
            if let Some(text) = line.strip_prefix('-') {
                chunk.push_removed(text);
                continue;
            }
            if let Some(text) = line.strip_prefix(' ') {
                chunk.push_unchanged(text);
                continue;
            }
            if line.is_empty() {
                // Some tools strip the leading space from blank context lines
                chunk.push_unchanged("");
                continue;
            }
            // Anything else ends a truncated chunk
            flush_chunk(&mut current, &mut current_chunk);
            continue;
        }

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            is_binary = true;
            continue;
        }

        if line.starts_with("new file mode") {
            file.is_new_file = true;
            continue;
        }

        if line.starts_with("deleted file mode") {
            file.is_deleted_file = true;
            continue;
        }

        if line.starts_with("rename from ") || line.starts_with("rename to ") {
            file.is_rename = true;
            continue;
        }

        if let Some(path) = line.strip_prefix("--- ") {
            file.old_path = parse_path(path);
            continue;
        }

        if let Some(path) = line.strip_prefix("+++ ") {
            file.new_path = parse_path(path);
            if path == "/dev/null" {
                file.is_deleted_file = true;
            }
            continue;
        }
    }

    flush_chunk(&mut current, &mut current_chunk);
    if let Some(file) = current.take() {
        if !is_binary {
            files.push(file);
        }
    }

    Ok(files)
}

struct ChunkBuilder {
    chunk: DiffChunk,
    pending_removed: VecDeque<String>,
    old_remaining: u32,
    new_remaining: u32,
}

impl ChunkBuilder {
    fn new(header: HunkHeader) -> Self {
        Self {
            chunk: DiffChunk {
                current_position: header.new.position,
                previous_position: header.old.position,
                lines: Vec::new(),
            },
            pending_removed: VecDeque::new(),
            old_remaining: header.old.count,
            new_remaining: header.new.count,
        }
    }

    /// Every line announced by the hunk header has been read.
    fn is_complete(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }

    fn push_removed(&mut self, text: &str) {
        self.old_remaining = self.old_remaining.saturating_sub(1);
        self.pending_removed.push_back(text.to_string());
    }

    fn push_added(&mut self, text: &str) {
        self.new_remaining = self.new_remaining.saturating_sub(1);
        let line = match self.pending_removed.pop_front() {
            Some(previous) => DiffLine::changed(text, previous),
            None => DiffLine::content(text, LineState::Added),
        };
        self.chunk.lines.push(line);
    }

    fn push_unchanged(&mut self, text: &str) {
        self.old_remaining = self.old_remaining.saturating_sub(1);
        self.new_remaining = self.new_remaining.saturating_sub(1);
        self.flush_removed();
        self.chunk
            .lines
            .push(DiffLine::content(text, LineState::Unchanged));
    }

    fn flush_removed(&mut self) {
        for _ in self.pending_removed.drain(..) {
            self.chunk.lines.push(DiffLine::Placeholder);
        }
    }

    fn finish(mut self) -> DiffChunk {
        self.flush_removed();
        self.chunk
    }
}

fn flush_chunk(current: &mut Option<FileDiff>, chunk: &mut Option<ChunkBuilder>) {
    if let Some(builder) = chunk.take() {
        if let Some(file) = current.as_mut() {
            file.chunks.push(builder.finish());
        }
    }
}

fn parse_path(raw: &str) -> PathBuf {
    let normalized = raw.trim_matches('"');

    if normalized == "/dev/null" {
        return PathBuf::from("/dev/null");
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);

    PathBuf::from(stripped)
}

/// One side of a `@@ -a,b +c,d @@` header.
struct HunkRange {
    position: ChunkPosition,
    count: u32,
}

struct HunkHeader {
    old: HunkRange,
    new: HunkRange,
}

fn parse_hunk_header(line: &str) -> Result<HunkHeader, MarginError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| MarginError::Parse(format!("invalid hunk header: {line}")))?;

    let parts: Vec<&str> = inner.split(' ').collect();
    if parts.len() != 2 {
        return Err(MarginError::Parse(format!("invalid hunk header: {line}")));
    }

    let old = parts[0]
        .strip_prefix('-')
        .ok_or_else(|| MarginError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = parts[1]
        .strip_prefix('+')
        .ok_or_else(|| MarginError::Parse(format!("invalid new range in hunk: {line}")))?;

    Ok(HunkHeader {
        old: parse_range(old, line)?,
        new: parse_range(new, line)?,
    })
}

fn parse_range(range: &str, context: &str) -> Result<HunkRange, MarginError> {
    let (start, count) = parse_range_numbers(range, context)?;
    let position = ChunkPosition::from_hunk_range(start, count)
        .ok_or_else(|| MarginError::Parse(format!("invalid hunk range in: {context}")))?;
    Ok(HunkRange { position, count })
}

fn parse_range_numbers(range: &str, context: &str) -> Result<(u32, u32), MarginError> {
    if let Some((start, count)) = range.split_once(',') {
        let s = start
            .parse()
            .map_err(|_| MarginError::Parse(format!("invalid range number in: {context}")))?;
        let c = count
            .parse()
            .map_err(|_| MarginError::Parse(format!("invalid range count in: {context}")))?;
        Ok((s, c))
    } else {
        let s = range
            .parse()
            .map_err(|_| MarginError::Parse(format!("invalid range number in: {context}")))?;
        Ok((s, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(chunk: &DiffChunk) -> Vec<Option<LineState>> {
        chunk.lines.iter().map(DiffLine::state).collect()
    }

    #[test]
    fn empty_diff_returns_empty_vec() {
        let files = parse_unified_diff("").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn single_file_single_chunk() {
        let diff = "\
diff --git a/src/main.rs b/src/main.rs
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@
 fn main() {
+    println!(\"hello\");
     let x = 1;
 }
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].new_path, PathBuf::from("src/main.rs"));
        assert_eq!(files[0].chunks.len(), 1);

        let chunk = &files[0].chunks[0];
        assert_eq!(chunk.previous_position, ChunkPosition { start: 1, end: 3 });
        assert_eq!(chunk.current_position, ChunkPosition { start: 1, end: 4 });
        assert_eq!(
            states(chunk),
            vec![
                Some(LineState::Unchanged),
                Some(LineState::Added),
                Some(LineState::Unchanged),
                Some(LineState::Unchanged),
            ]
        );
        assert_eq!(chunk.lines[1].text(), Some("    println!(\"hello\");"));
    }

    #[test]
    fn replaced_lines_become_changed() {
        let diff = "\
--- a/lib.rs
+++ b/lib.rs
@@ -1,3 +1,3 @@
 fn foo() {
-    old();
+    new();
 }
";
        let files = parse_unified_diff(diff).unwrap();
        let chunk = &files[0].chunks[0];
        assert_eq!(
            chunk.lines[1],
            DiffLine::changed("    new();", "    old();")
        );
    }

    #[test]
    fn surplus_removals_become_placeholders() {
        let diff = "\
--- a/lib.rs
+++ b/lib.rs
@@ -1,5 +1,3 @@
 a
-b
-c
-d
+B
 e
";
        let files = parse_unified_diff(diff).unwrap();
        let chunk = &files[0].chunks[0];
        assert_eq!(
            states(chunk),
            vec![
                Some(LineState::Unchanged),
                Some(LineState::Changed),
                None,
                None,
                Some(LineState::Unchanged),
            ]
        );
    }

    #[test]
    fn surplus_additions_become_added() {
        let diff = "\
--- a/lib.rs
+++ b/lib.rs
@@ -1,2 +1,3 @@
-a
+A
+A2
 b
";
        let files = parse_unified_diff(diff).unwrap();
        let chunk = &files[0].chunks[0];
        assert_eq!(
            states(chunk),
            vec![
                Some(LineState::Changed),
                Some(LineState::Added),
                Some(LineState::Unchanged),
            ]
        );
    }

    #[test]
    fn trailing_removals_flush_at_chunk_end() {
        let diff = "\
--- a/lib.rs
+++ b/lib.rs
@@ -1,2 +1,1 @@
 a
-b
@@ -10,1 +9,2 @@
 x
+y
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files[0].chunks.len(), 2);
        assert_eq!(
            states(&files[0].chunks[0]),
            vec![Some(LineState::Unchanged), None]
        );
        assert_eq!(files[0].chunks[1].current_position.start, 9);
    }

    #[test]
    fn multiple_files() {
        let diff = "\
diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -1 +1,2 @@
 line1
+line2
diff --git a/b.rs b/b.rs
--- a/b.rs
+++ b/b.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].new_path, PathBuf::from("a.rs"));
        assert_eq!(files[1].new_path, PathBuf::from("b.rs"));
    }

    #[test]
    fn new_file() {
        let diff = "\
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,3 @@
+fn hello() {
+    println!(\"new\");
+}
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].is_new_file);
        assert_eq!(files[0].old_path, PathBuf::from("/dev/null"));
        assert_eq!(files[0].new_path, PathBuf::from("new.rs"));
        assert!(files[0].chunks[0]
            .lines
            .iter()
            .all(|l| l.state() == Some(LineState::Added)));
    }

    #[test]
    fn deleted_file() {
        let diff = "\
diff --git a/old.rs b/old.rs
deleted file mode 100644
--- a/old.rs
+++ /dev/null
@@ -1,3 +0,0 @@
-fn goodbye() {
-    println!(\"old\");
-}
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].is_deleted_file);
        assert_eq!(files[0].new_path, PathBuf::from("/dev/null"));
        assert!(files[0].chunks[0].lines.iter().all(DiffLine::is_placeholder));
    }

    #[test]
    fn renamed_file() {
        let diff = "\
diff --git a/old_name.rs b/new_name.rs
similarity index 100%
rename from old_name.rs
rename to new_name.rs
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].is_rename);
    }

    #[test]
    fn binary_files_skipped() {
        let diff = "\
diff --git a/image.png b/image.png
Binary files a/image.png and b/image.png differ
diff --git a/code.rs b/code.rs
--- a/code.rs
+++ b/code.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].new_path, PathBuf::from("code.rs"));
    }

    #[test]
    fn no_newline_at_eof_handled() {
        let diff = "\
diff --git a/f.rs b/f.rs
--- a/f.rs
+++ b/f.rs
@@ -1 +1 @@
-old
\\ No newline at end of file
+new
\\ No newline at end of file
";
        let files = parse_unified_diff(diff).unwrap();
        let chunk = &files[0].chunks[0];
        assert_eq!(chunk.lines, vec![DiffLine::changed("new", "old")]);
    }

    #[test]
    fn removed_line_resembling_header_stays_in_chunk() {
        let diff = "\
--- a/notes.md
+++ b/notes.md
@@ -1,2 +1,1 @@
--- a/section
 keep
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files[0].old_path, PathBuf::from("notes.md"));
        let chunk = &files[0].chunks[0];
        assert_eq!(states(chunk), vec![None, Some(LineState::Unchanged)]);
    }

    #[test]
    fn malformed_hunk_header_is_error() {
        let diff = "\
--- a/f.rs
+++ b/f.rs
@@ -x +1 @@
";
        let err = parse_unified_diff(diff).unwrap_err();
        assert!(err.to_string().contains("invalid range number"));
    }

    #[test]
    fn hunk_range_past_u32_is_error() {
        let diff = "\
--- a/f
+++ b/f
@@ -1,1 +4294967295,2 @@
 a
";
        let err = parse_unified_diff(diff).unwrap_err();
        assert!(err.to_string().contains("invalid hunk range"));
    }

    #[test]
    fn parse_path_handles_quoted_paths() {
        assert_eq!(parse_path("\"a/src/my file.rs\""), PathBuf::from("src/my file.rs"));
        assert_eq!(parse_path("\"b/src/my file.rs\""), PathBuf::from("src/my file.rs"));
    }

    #[test]
    fn real_world_fixture() {
        let diff = include_str!("../tests/fixtures/recent.diff");
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].chunks.len(), 2);
    }
}
