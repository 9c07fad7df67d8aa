//! margin-annotations: recent-change decorations for an open document.
//!
//! - [`editor`]: the [`editor::TextEditor`] surface and a headless buffer
//! - [`hover`]: markdown hovers for commits and changed lines
//! - [`render`]: [`render::AnnotationRenderRequestBuilder`]
//! - [`provider`]: [`provider::RecentChangesAnnotationProvider`]

pub mod editor;
pub mod hover;
pub mod provider;
pub mod render;
