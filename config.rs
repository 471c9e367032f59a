use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage layout for a planner instance. Built once at startup and passed by
/// reference into every component; nothing reads ambient path state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppPaths {
    pub root: PathBuf,
    pub db_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub thumbs_dir: PathBuf,
    pub fonts_dir: PathBuf,
}

impl AppPaths {
    /// Derives the storage layout under `root` and creates the directories.
    ///
    /// Originals live directly under `uploads/`; thumbnails under
    /// `uploads/thumbs/` with a `thumb_` name prefix. Readers must also accept
    /// thumbnails flat in `uploads/` (the historical layout).
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, crate::error::Error> {
        let root = root.into();
        let db_path = root.join("storyboard.db");
        let uploads_dir = root.join("uploads");
        let thumbs_dir = uploads_dir.join("thumbs");
        let fonts_dir = root.join("fonts");

        std::fs::create_dir_all(&uploads_dir)?;
        std::fs::create_dir_all(&thumbs_dir)?;
        std::fs::create_dir_all(&fonts_dir)?;

        Ok(Self {
            root,
            db_path,
            uploads_dir,
            thumbs_dir,
            fonts_dir,
        })
    }

    /// Resolves a font file, preferring the instance `fonts/` directory and
    /// falling back to a `fonts/` folder next to the manifest for dev runs.
    /// The returned path may not exist; export degrades to a builtin font.
    pub fn resolve_font(&self, name: &str) -> PathBuf {
        let primary = self.fonts_dir.join(name);
        if primary.exists() {
            return primary;
        }
        let dev_fallback = Path::new(env!("CARGO_MANIFEST_DIR")).join("fonts").join(name);
        if dev_fallback.exists() {
            return dev_fallback;
        }
        primary
    }

    /// Full path of an original image stored under `uploads/`.
    pub fn upload_path(&self, filename: &str) -> PathBuf {
        self.uploads_dir.join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::at(dir.path()).unwrap();
        assert!(paths.uploads_dir.is_dir());
        assert!(paths.thumbs_dir.is_dir());
        assert!(paths.thumbs_dir.starts_with(&paths.uploads_dir));
        assert_eq!(paths.db_path, dir.path().join("storyboard.db"));
    }
}
