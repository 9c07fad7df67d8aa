use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sha used for changes that only exist in the working tree.
pub const UNCOMMITTED_SHA: &str = "0000000000000000000000000000000000000000";

/// Character index meaning "to the end of the line", clamped on validation.
pub const END_OF_LINE: u32 = 1_000_000;

/// A revision of a file, as returned by the version-control query layer.
///
/// # Examples
///
/// ```
/// use margin_core::Commit;
/// use chrono::{TimeZone, Utc};
/// use std::path::PathBuf;
///
/// let commit = Commit {
///     sha: "1a2b3c4d5e6f".into(),
///     previous_sha: Some("0f9e8d7c6b5a".into()),
///     repo_path: PathBuf::from("/work/repo"),
///     file_name: PathBuf::from("src/lib.rs"),
///     author: "alice".into(),
///     email: "alice@example.com".into(),
///     date: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
///     message: "fix: handle empty chunks".into(),
/// };
/// assert_eq!(commit.short_sha(), "1a2b3c4");
/// assert_eq!(commit.previous_short_sha(), Some("0f9e8d7"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Full commit sha.
    pub sha: String,
    /// Sha of the previous revision of the file, if it has one.
    pub previous_sha: Option<String>,
    /// Repository working directory.
    pub repo_path: PathBuf,
    /// File path relative to the repository root.
    pub file_name: PathBuf,
    /// Author name.
    pub author: String,
    /// Author email.
    pub email: String,
    /// Author date.
    pub date: DateTime<Utc>,
    /// First line of the commit message.
    pub message: String,
}

impl Commit {
    /// First seven characters of the sha.
    pub fn short_sha(&self) -> &str {
        shorten_sha(&self.sha)
    }

    /// First seven characters of the previous sha.
    pub fn previous_short_sha(&self) -> Option<&str> {
        self.previous_sha.as_deref().map(shorten_sha)
    }

    /// Whether this "commit" stands for uncommitted working-tree changes.
    pub fn is_uncommitted(&self) -> bool {
        self.sha == UNCOMMITTED_SHA
    }
}

/// First seven characters of `sha`, or all of it when shorter.
pub fn shorten_sha(sha: &str) -> &str {
    match sha.char_indices().nth(7) {
        Some((end, _)) => &sha[..end],
        None => sha,
    }
}

/// A file in a repository, optionally pinned to a revision.
///
/// # Examples
///
/// ```
/// use margin_core::GitUri;
/// use std::path::{Path, PathBuf};
///
/// let uri = GitUri::new("/work/repo", "src/main.rs");
/// assert_eq!(uri.fs_path(), PathBuf::from("/work/repo/src/main.rs"));
/// assert!(uri.sha.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitUri {
    /// Repository working directory.
    pub repo_path: PathBuf,
    /// File path relative to the repository root.
    pub path: PathBuf,
    /// Revision the uri points at; `None` means the working tree.
    pub sha: Option<String>,
}

impl GitUri {
    pub fn new(repo_path: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            path: path.into(),
            sha: None,
        }
    }

    /// Absolute path of the file on disk.
    pub fn fs_path(&self) -> PathBuf {
        self.repo_path.join(&self.path)
    }

    /// The repository-relative path.
    pub fn relative_path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for GitUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sha {
            Some(sha) => write!(f, "{}@{}", self.path.display(), shorten_sha(sha)),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Zero-based position in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Zero-based range in a document.
///
/// # Examples
///
/// ```
/// use margin_core::{Range, END_OF_LINE};
///
/// let range = Range::whole_line(4);
/// assert_eq!(range.start.line, 4);
/// assert_eq!(range.start.character, 0);
/// assert_eq!(range.end.character, END_OF_LINE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// `(line, 0) .. (line, END_OF_LINE)`, before validation.
    pub fn whole_line(line: u32) -> Self {
        Self {
            start: Position::new(line, 0),
            end: Position::new(line, END_OF_LINE),
        }
    }
}

/// Markdown content shown in a hover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkdownString(pub String);

impl MarkdownString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkdownString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One decoration to apply to a document range.
///
/// When several requests target the same range, the first one applied is the
/// base layer and later ones are painted above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationRequest {
    pub range: Range,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hover_message: Option<MarkdownString>,
}

/// How dates are rendered.
///
/// # Examples
///
/// ```
/// use margin_core::DateStyle;
///
/// assert_eq!("absolute".parse::<DateStyle>().unwrap(), DateStyle::Absolute);
/// assert_eq!(DateStyle::default(), DateStyle::Relative);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateStyle {
    /// "3 days ago".
    #[default]
    Relative,
    /// Formatted with the configured date format.
    Absolute,
}

impl FromStr for DateStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relative" => Ok(DateStyle::Relative),
            "absolute" => Ok(DateStyle::Absolute),
            other => Err(format!("unknown date style: {other}")),
        }
    }
}

/// Kinds of whole-file annotation.
///
/// # Examples
///
/// ```
/// use margin_core::FileAnnotationType;
///
/// assert_eq!(FileAnnotationType::RecentChanges.to_string(), "recent changes");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileAnnotationType {
    /// Blame in the gutter.
    #[default]
    Gutter,
    /// Age heatmap.
    Heatmap,
    /// Blame on hover only.
    Hover,
    /// Lines changed since the previous revision.
    RecentChanges,
}

impl fmt::Display for FileAnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileAnnotationType::Gutter => write!(f, "gutter"),
            FileAnnotationType::Heatmap => write!(f, "heatmap"),
            FileAnnotationType::Hover => write!(f, "hover"),
            FileAnnotationType::RecentChanges => write!(f, "recent changes"),
        }
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use margin_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// GitHub-flavored Markdown.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
