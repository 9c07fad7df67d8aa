//! margin-codelens: blame code lenses and the controller that keeps their
//! provider in step with configuration and document state.

pub mod controller;
pub mod provider;
pub mod registry;
pub mod tracker;
