//! Unified diff parsing and diff-to-document line mapping.
//!
//! Parses `git diff` output into chunks whose current-side lines are tagged
//! as unchanged, added, changed, or placeholders for removed lines, and maps
//! each chunk's differing lines onto zero-based document lines.

pub mod diff;
pub mod mapper;
pub mod parser;
