//! Core of an offline storyboard planner: frame records in SQLite, image
//! ingestion (file uploads and inline-drawn sketches) with normalization and
//! thumbnails, and paginated PDF export. The HTTP layer in front of this
//! crate is an external collaborator.

pub mod config;
pub mod db;
pub mod error;
pub mod fonts;
pub mod ingest;
pub mod library;
pub mod models;
pub mod names;
pub mod pdf;
pub mod schema;
pub mod thumbnails;

#[cfg(test)]
pub(crate) mod testutil;

pub use crate::config::AppPaths;
pub use crate::db::{DbConnection, DbPool};
pub use crate::error::{Error, Result};
pub use crate::models::{
    FrameRecord, FrameUpdate, ImageSource, NewFrame, ProjectRecord, SourceKind, UserRecord,
};
pub use crate::pdf::{EXPORT_FILENAME, EXPORT_MIME};
