//! Core types, configuration, and error handling for Margin.
//!
//! This crate provides the shared foundation used by all other Margin crates:
//! - [`MarginError`]: unified error type using `thiserror`
//! - [`MarginConfig`]: configuration loaded from `.margin.toml`
//! - [`ConfigurationStore`]: live configuration with change events
//! - [`Disposable`] and [`EventEmitter`]: subscription plumbing
//! - Shared types: [`Commit`], [`GitUri`], [`Range`], [`DecorationRequest`],
//!   [`DateStyle`], [`FileAnnotationType`], [`OutputFormat`]

mod config;
mod disposable;
mod error;
mod event;
mod store;
mod types;

pub use config::{
    AnnotationsConfig, BlameConfig, BlameFileConfig, CodeLensConfig, CodeLensItemConfig,
    FileAnnotationsConfig, HoverConfig, MarginConfig, RecentChangesConfig, DEFAULT_DATE_FORMAT,
};
pub use disposable::Disposable;
pub use error::MarginError;
pub use event::EventEmitter;
pub use store::{ConfigurationChangeEvent, ConfigurationStore};
pub use types::{
    shorten_sha, Commit, DateStyle, DecorationRequest, FileAnnotationType, GitUri,
    MarkdownString, OutputFormat, Position, Range, END_OF_LINE, UNCOMMITTED_SHA,
};

/// A convenience `Result` type for Margin operations.
pub type Result<T> = std::result::Result<T, MarginError>;
