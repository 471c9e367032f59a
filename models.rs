use crate::config::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Description used when a frame is created without one.
pub const DEFAULT_DESCRIPTION: &str = "No description";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserRecord {
    pub id: Option<i64>,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectRecord {
    pub id: Option<i64>,
    pub name: String,
    pub user_id: i64,
}

/// One storyboard shot. `image_path`/`thumbnail_path` are filenames relative
/// to the uploads directory; either may be null independently (thumbnail
/// generation failures are swallowed at ingestion).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FrameRecord {
    pub id: Option<i64>,
    pub project_id: i64,
    pub description: String,
    pub character_name: Option<String>,
    pub shoot_time: Option<String>,
    pub location: Option<String>,
    pub image_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub position: i64,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// The two ways an image reaches ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImageSource {
    /// A file upload claiming a filename with extension.
    Upload { filename: String, bytes: Vec<u8> },
    /// An inline drawing as a `<prefix>,<base64>` data URL.
    Sketch { data_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Upload,
    Sketch,
}

/// Input for the add-frame operation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewFrame {
    pub description: Option<String>,
    pub character_name: Option<String>,
    pub shoot_time: Option<String>,
    pub location: Option<String>,
    pub image: Option<ImageSource>,
}

/// Edit payload: all four optional columns are overwritten as given.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FrameUpdate {
    pub description: Option<String>,
    pub character_name: Option<String>,
    pub shoot_time: Option<String>,
    pub location: Option<String>,
}

/// How a frame's thumbnail filename is known. Rows written before the
/// `thumbnail_path` column existed derive the name by the `thumb_` prefix
/// convention instead of reading it from the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailRef {
    Explicit(String),
    Conventional(String),
}

impl ThumbnailRef {
    pub fn filename(&self) -> &str {
        match self {
            ThumbnailRef::Explicit(name) | ThumbnailRef::Conventional(name) => name,
        }
    }

    /// Resolves against both supported layouts: `uploads/thumbs/<name>` and,
    /// for data predating the subdirectory, flat `uploads/<name>`.
    pub fn resolve(&self, paths: &AppPaths) -> PathBuf {
        let preferred = paths.thumbs_dir.join(self.filename());
        if preferred.exists() {
            return preferred;
        }
        let flat = paths.uploads_dir.join(self.filename());
        if flat.exists() {
            return flat;
        }
        preferred
    }
}

impl FrameRecord {
    /// The frame's thumbnail reference, if it has an image at all.
    pub fn thumbnail_ref(&self) -> Option<ThumbnailRef> {
        if let Some(name) = &self.thumbnail_path {
            return Some(ThumbnailRef::Explicit(name.clone()));
        }
        self.image_path
            .as_ref()
            .map(|name| ThumbnailRef::Conventional(format!("thumb_{name}")))
    }
}
