use crate::models::SourceKind;
use chrono::NaiveDateTime;
use std::path::Path;

/// Storage filenames chosen for one ingested image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedNames {
    pub image: String,
    pub thumbnail: String,
}

/// Reduces an incoming filename to a filesystem-safe form: path separators
/// and unsafe characters become underscores, leading dots are stripped so the
/// result can never name a hidden file or traversal segment.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_' || c == '-');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

fn split_stem(filename: &str) -> (&str, String) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{}", ext.to_lowercase())),
        _ => (filename, String::new()),
    }
}

/// Chooses collision-resistant storage names for an original and its
/// thumbnail. Second-resolution timestamps can collide under rapid uploads,
/// so the chosen name is probed against `uploads_dir` and suffixed `_1`,
/// `_2`, ... until free.
pub fn allocate(
    kind: SourceKind,
    original_name: Option<&str>,
    now: NaiveDateTime,
    uploads_dir: &Path,
) -> AllocatedNames {
    let timestamp = now.format("%Y%m%d_%H%M%S");
    let (stem, ext) = match kind {
        SourceKind::Sketch => (format!("sketch_{timestamp}"), ".png".to_string()),
        SourceKind::Upload => {
            let sanitized = sanitize_filename(original_name.unwrap_or("upload"));
            let (stem, ext) = split_stem(&sanitized);
            (format!("{stem}_{timestamp}"), ext)
        }
    };

    let mut image = format!("{stem}{ext}");
    let mut attempt = 0u32;
    while uploads_dir.join(&image).exists() {
        attempt += 1;
        image = format!("{stem}_{attempt}{ext}");
    }

    AllocatedNames {
        thumbnail: format!("thumb_{image}"),
        image,
    }
}
