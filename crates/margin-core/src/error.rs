use std::path::PathBuf;

/// Errors that can occur across the Margin workspace.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate reports it through `miette` at the boundary.
///
/// An absent commit or diff is *not* an error: query methods return
/// `Ok(None)` for untracked files and files without history.
///
/// # Examples
///
/// ```
/// use margin_core::MarginError;
///
/// let err = MarginError::Config("unknown date style".into());
/// assert!(err.to_string().contains("unknown date style"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum MarginError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(margin::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(margin::config))]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    #[diagnostic(code(margin::git))]
    Git(String),

    /// Diff parsing failure.
    #[error("parse error: {0}")]
    #[diagnostic(code(margin::parse))]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(margin::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(margin::toml))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(margin::file_not_found))]
    FileNotFound(PathBuf),
}
