#![warn(clippy::all, missing_docs)]

//! Core domain logic for gamelib, a personal game library manager.
//!
//! This crate hosts the game record model, per-source identity and launch
//! rules, the keyed library store with its merge semantics, configuration
//! handling, and JSON persistence used by the command line frontend.

pub mod config;
pub mod error;
pub mod launch;
pub mod library;
pub mod manifest;
pub mod models;
pub mod save;
pub mod source;

pub use config::AppConfig;
pub use error::{LibraryError, Result};
pub use launch::{LaunchPlan, LaunchPlanner, LaunchSettings};
pub use library::{Library, SharedLibrary};
pub use manifest::BundleManifest;
pub use models::{FieldMap, Game, GameField, Priority};
pub use source::{SourceKind, SourceRegistry, SourceStrategy};
