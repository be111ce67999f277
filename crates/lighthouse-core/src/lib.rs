//! Core domain types and traits for Lighthouse.
//!
//! This crate contains:
//! - Watched repository targets and the watch list
//! - The error taxonomy shared by every pipeline stage
//! - Pipeline stages, states and outcomes
//! - Seams to external systems (container runtime, compose tool, secret store)

pub mod compose;
pub mod error;
pub mod id;
pub mod pipeline;
pub mod repository;
pub mod runtime;
pub mod secret;
pub mod watchlist;

pub use error::{Error, Result};
pub use id::RunId;
pub use repository::{RepoTarget, WatchedRepo};
