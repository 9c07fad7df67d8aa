//! Markdown hover content for annotated lines.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use chrono_humanize::HumanTime;
use margin_core::{
    shorten_sha, Commit, DateStyle, FileAnnotationType, GitUri, MarkdownString, DEFAULT_DATE_FORMAT,
};
use margin_difflens::diff::{DiffLine, LineState};
use serde_json::json;

/// Command shown behind a commit's short sha.
pub const SHOW_COMMIT_DETAILS_COMMAND: &str = "margin.showQuickCommitDetails";
/// Command that opens the commit on the repository's remote.
pub const OPEN_COMMIT_IN_REMOTE_COMMAND: &str = "margin.openCommitInRemote";
/// Command that toggles the whole-file blame annotation.
pub const TOGGLE_FILE_BLAME_COMMAND: &str = "margin.toggleFileBlame";
/// Command that opens a diff of the line against the previous revision.
pub const DIFF_WITH_PREVIOUS_COMMAND: &str = "margin.diffWithPrevious";

/// Settings and per-pass facts needed to render a commit hover.
#[derive(Debug, Clone)]
pub struct HoverContext<'a> {
    pub date_style: DateStyle,
    pub date_format: &'a str,
    /// Whether the repository has a remote; resolved once per pass.
    pub has_remote: bool,
    /// Blame annotation offered by the toggle link.
    pub annotation_type: FileAnnotationType,
    /// Reference point for relative dates.
    pub now: DateTime<Utc>,
}

/// Render `date` per `style`.
///
/// Relative dates read like "3 days ago". Absolute dates use the strftime
/// `format`, falling back to [`DEFAULT_DATE_FORMAT`] when it is invalid.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use margin_annotations::hover::format_date;
/// use margin_core::DateStyle;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
/// let date = now - Duration::days(3);
/// assert_eq!(format_date(date, now, DateStyle::Relative, "%Y"), "3 days ago");
/// assert_eq!(format_date(date, now, DateStyle::Absolute, "%Y-%m-%d"), "2024-03-01");
/// ```
pub fn format_date(
    date: DateTime<Utc>,
    now: DateTime<Utc>,
    style: DateStyle,
    format: &str,
) -> String {
    match style {
        DateStyle::Relative => HumanTime::from(date - now).to_string(),
        DateStyle::Absolute => {
            let mut out = String::new();
            if write!(out, "{}", date.format(format)).is_err() {
                tracing::debug!(format, "invalid date format, using default");
                return date.format(DEFAULT_DATE_FORMAT).to_string();
            }
            out
        }
    }
}

/// The commit summary hover: sha link, author, date, optional remote link,
/// a toggle for file blame, and the commit message.
pub fn commit_hover_message(commit: &Commit, ctx: &HoverContext<'_>) -> MarkdownString {
    let date = format_date(commit.date, ctx.now, ctx.date_style, ctx.date_format);
    let mut out = String::new();

    if commit.is_uncommitted() {
        out.push_str("`Uncommitted changes`");
    } else {
        let args = json!({ "sha": commit.sha, "repoPath": commit.repo_path });
        out.push_str(&format!(
            "[`{}`]({} \"Show Commit Details\")",
            commit.short_sha(),
            command_uri(SHOW_COMMIT_DETAILS_COMMAND, &args)
        ));
    }

    out.push_str(&format!(" &nbsp; __{}__, {}", escape_markdown(&commit.author), date));

    if ctx.has_remote && !commit.is_uncommitted() {
        let args = json!({ "sha": commit.sha, "repoPath": commit.repo_path });
        out.push_str(&format!(
            " &nbsp; [Open on Remote]({})",
            command_uri(OPEN_COMMIT_IN_REMOTE_COMMAND, &args)
        ));
    }

    let args = json!({ "type": ctx.annotation_type, "sha": commit.sha });
    out.push_str(&format!(
        " &nbsp; [Toggle File Blame ({})]({})",
        ctx.annotation_type,
        command_uri(TOGGLE_FILE_BLAME_COMMAND, &args)
    ));

    if !commit.is_uncommitted() && !commit.message.is_empty() {
        out.push_str(&format!("\n\n---\n\n{}", escape_markdown(&commit.message)));
    }

    MarkdownString(out)
}

/// The hover showing how `line` differs from the previous revision.
///
/// `None` for unchanged lines and placeholders.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use margin_annotations::hover::diff_hover_message;
/// use margin_core::{Commit, GitUri};
/// use margin_difflens::diff::DiffLine;
///
/// let commit = Commit {
///     sha: "1a2b3c4d5e6f".into(),
///     previous_sha: Some("9f8e7d6c5b4a".into()),
///     repo_path: "/repo".into(),
///     file_name: "src/lib.rs".into(),
///     author: "alice".into(),
///     email: "alice@example.com".into(),
///     date: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
///     message: "tweak".into(),
/// };
/// let uri = GitUri::new("/repo", "src/lib.rs");
/// let hover = diff_hover_message(&commit, &uri, &DiffLine::changed("let x = 2;", "let x = 1;")).unwrap();
/// assert!(hover.as_str().contains("- let x = 1;\n+ let x = 2;"));
/// ```
pub fn diff_hover_message(commit: &Commit, uri: &GitUri, line: &DiffLine) -> Option<MarkdownString> {
    let DiffLine::Content(content) = line else {
        return None;
    };

    let body = match content.state {
        LineState::Unchanged => return None,
        LineState::Added => format!("+ {}", content.text),
        LineState::Removed => format!("- {}", content.text),
        LineState::Changed => match &content.previous {
            Some(previous) => format!("- {previous}\n+ {}", content.text),
            None => format!("+ {}", content.text),
        },
    };

    let from = commit.previous_short_sha().unwrap_or("(empty)");
    let to = match &uri.sha {
        Some(sha) => format!("`{}`", shorten_sha(sha)),
        None => "_Working Tree_".to_string(),
    };
    let args = json!({
        "repoPath": uri.repo_path,
        "path": uri.path,
        "sha": commit.previous_sha,
    });

    Some(MarkdownString(format!(
        "[Changes]({} \"Open Changes\") &nbsp; `{from}` → {to}\n\n---\n\n```diff\n{body}\n```",
        command_uri(DIFF_WITH_PREVIOUS_COMMAND, &args)
    )))
}

fn command_uri(command: &str, args: &serde_json::Value) -> String {
    format!("command:{command}?{}", urlencoding::encode(&args.to_string()))
}

fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '#' | '|') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
