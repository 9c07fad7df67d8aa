use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MarginError;
use crate::types::{DateStyle, FileAnnotationType};

/// Date format used when `defaultDateFormat` is not set (chrono strftime syntax).
pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y %-I:%M%P";

/// Top-level configuration loaded from `.margin.toml`.
///
/// Keys mirror the editor settings they stand in for, so the TOML file uses
/// camelCase tables such as `[codeLens.recentChange]`.
///
/// # Examples
///
/// ```
/// use margin_core::MarginConfig;
///
/// let config = MarginConfig::default();
/// assert!(config.code_lens.enabled);
/// assert!(config.annotations.file.recent_changes.hover.details);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginConfig {
    /// File annotation settings.
    #[serde(default)]
    pub annotations: AnnotationsConfig,
    /// Blame annotation settings.
    #[serde(default)]
    pub blame: BlameConfig,
    /// Code lens settings.
    #[serde(default)]
    pub code_lens: CodeLensConfig,
    /// How dates are rendered in hovers and lenses.
    #[serde(default)]
    pub default_date_style: DateStyle,
    /// strftime format for absolute dates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_date_format: Option<String>,
}

impl MarginConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MarginError::Io`] if the file cannot be read, or
    /// [`MarginError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use margin_core::MarginConfig;
    /// use std::path::Path;
    ///
    /// let config = MarginConfig::from_file(Path::new(".margin.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, MarginError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`MarginError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use margin_core::MarginConfig;
    ///
    /// let toml = r#"
    /// [codeLens]
    /// enabled = false
    /// "#;
    /// let config = MarginConfig::from_toml(toml).unwrap();
    /// assert!(!config.code_lens.enabled);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, MarginError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// The configured absolute date format, or [`DEFAULT_DATE_FORMAT`].
    pub fn date_format(&self) -> &str {
        self.default_date_format
            .as_deref()
            .unwrap_or(DEFAULT_DATE_FORMAT)
    }
}

/// `annotations.*`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationsConfig {
    #[serde(default)]
    pub file: FileAnnotationsConfig,
}

/// `annotations.file.*`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnnotationsConfig {
    #[serde(default)]
    pub recent_changes: RecentChangesConfig,
}

/// `annotations.file.recentChanges.*`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentChangesConfig {
    #[serde(default)]
    pub hover: HoverConfig,
}

/// Hover content toggles for recent-changes annotations.
///
/// # Examples
///
/// ```
/// use margin_core::HoverConfig;
///
/// let hover = HoverConfig::default();
/// assert!(hover.details && hover.changes);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoverConfig {
    /// Show the commit summary (author, date, message) on hover.
    #[serde(default = "default_true")]
    pub details: bool,
    /// Show the line's diff against the previous revision on hover.
    #[serde(default = "default_true")]
    pub changes: bool,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            details: true,
            changes: true,
        }
    }
}

/// `blame.*`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlameConfig {
    #[serde(default)]
    pub file: BlameFileConfig,
}

/// `blame.file.*`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlameFileConfig {
    /// Annotation style used when file blame is toggled on.
    #[serde(default)]
    pub annotation_type: FileAnnotationType,
}

/// Code lens configuration.
///
/// # Examples
///
/// ```
/// use margin_core::CodeLensConfig;
///
/// let mut config = CodeLensConfig::default();
/// assert!(config.is_active());
///
/// config.recent_change.enabled = false;
/// config.authors.enabled = false;
/// assert!(!config.is_active());
/// assert!(!config.can_toggle());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeLensConfig {
    /// Master switch for code lenses.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// The "most recent change" lens.
    #[serde(default)]
    pub recent_change: CodeLensItemConfig,
    /// The "N authors" lens.
    #[serde(default)]
    pub authors: CodeLensItemConfig,
}

impl CodeLensConfig {
    /// At least one lens kind is switched on.
    pub fn can_toggle(&self) -> bool {
        self.recent_change.enabled || self.authors.enabled
    }

    /// Code lenses should be registered.
    pub fn is_active(&self) -> bool {
        self.enabled && self.can_toggle()
    }
}

impl Default for CodeLensConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recent_change: CodeLensItemConfig::default(),
            authors: CodeLensItemConfig::default(),
        }
    }
}

/// Per-lens toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeLensItemConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CodeLensItemConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}
