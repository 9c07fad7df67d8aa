//! margin-git: repository queries for annotations and code lenses.
//!
//! [`service::GitService`] is the seam the rest of margin depends on;
//! [`repository::LocalGitService`] answers it from a repository on disk.

pub mod blame;
pub mod repository;
pub mod service;
