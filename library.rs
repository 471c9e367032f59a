use crate::config::AppPaths;
use crate::db::{self, DbPool};
use crate::error::{Error, Result};
use crate::ingest;
use crate::models::{FrameRecord, ImageSource, NewFrame, DEFAULT_DESCRIPTION};
use crate::names;
use crate::thumbnails;
use std::path::Path;

/// Creates a frame in an existing project, ingesting its image if one was
/// supplied. Decode and storage failures degrade to a frame without an image
/// (logged); only a missing project or a store error fail the operation.
pub fn add_frame(
    pool: &DbPool,
    paths: &AppPaths,
    project_id: i64,
    new: NewFrame,
) -> Result<FrameRecord> {
    let conn = pool.get()?;
    if db::get_project(&conn, project_id)?.is_none() {
        return Err(Error::NotFound(format!("project {project_id}")));
    }

    let (image_path, thumbnail_path) = match &new.image {
        Some(source) => ingest_image(paths, source),
        None => (None, None),
    };

    let description = new
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

    let mut frame = FrameRecord {
        id: None,
        project_id,
        description,
        character_name: new.character_name,
        shoot_time: new.shoot_time,
        location: new.location,
        image_path,
        thumbnail_path,
        position: 0,
        created_at: None,
        updated_at: None,
    };
    let frame_id = db::insert_frame(&conn, &frame)?;
    frame.id = Some(frame_id);
    Ok(frame)
}

/// Decodes, normalizes, allocates names and writes the image pair, returning
/// the stored filenames. On any failure the attachment is abandoned (partial
/// files removed) and the frame proceeds without an image; a thumbnail-only
/// failure keeps the original and leaves the thumbnail null.
fn ingest_image(paths: &AppPaths, source: &ImageSource) -> (Option<String>, Option<String>) {
    let decoded = match ingest::decode(source) {
        Ok(decoded) => decoded,
        Err(err) => {
            log::warn!("Image decode failed; creating frame without image: {err}");
            return (None, None);
        }
    };

    let original_name = match source {
        ImageSource::Upload { filename, .. } => Some(filename.as_str()),
        ImageSource::Sketch { .. } => None,
    };
    let names = names::allocate(
        decoded.kind,
        original_name,
        chrono::Local::now().naive_local(),
        &paths.uploads_dir,
    );

    let original = thumbnails::normalize(&decoded.image, decoded.kind);
    let original_path = paths.upload_path(&names.image);
    if let Err(err) = original.save(&original_path) {
        log::warn!(
            "Failed to store image {}; creating frame without image: {err}",
            original_path.display()
        );
        best_effort_remove(&original_path);
        return (None, None);
    }

    let thumb = thumbnails::thumbnail_of(&original);
    let thumb_path = paths.thumbs_dir.join(&names.thumbnail);
    match thumb.save(&thumb_path) {
        Ok(()) => (Some(names.image), Some(names.thumbnail)),
        Err(err) => {
            log::warn!("Thumbnail generation failed for {}: {err}", names.image);
            best_effort_remove(&thumb_path);
            (Some(names.image), None)
        }
    }
}

/// Deletes a frame record, then releases its stored files. Record first:
/// an interruption leaks at worst a file on disk, never a record pointing
/// at nothing we know about.
pub fn delete_frame(pool: &DbPool, paths: &AppPaths, frame_id: i64) -> Result<()> {
    let conn = pool.get()?;
    let frame = db::get_frame(&conn, frame_id)?
        .ok_or_else(|| Error::NotFound(format!("frame {frame_id}")))?;
    db::delete_frame_record(&conn, frame_id)?;
    release_files(paths, &frame);
    Ok(())
}

/// Deletes a project and all its frames (records in one transaction), then
/// best-effort releases every frame's files.
pub fn delete_project(pool: &DbPool, paths: &AppPaths, project_id: i64) -> Result<()> {
    let mut conn = pool.get()?;
    if db::get_project(&conn, project_id)?.is_none() {
        return Err(Error::NotFound(format!("project {project_id}")));
    }
    let frames = db::delete_project_records(&mut conn, project_id)?;
    for frame in &frames {
        release_files(paths, frame);
    }
    Ok(())
}

/// Cascades through all of a user's projects and frames, then the user.
pub fn delete_user(pool: &DbPool, paths: &AppPaths, user_id: i64) -> Result<()> {
    let mut conn = pool.get()?;
    if db::get_user(&conn, user_id)?.is_none() {
        return Err(Error::NotFound(format!("user {user_id}")));
    }
    let frames = db::delete_user_records(&mut conn, user_id)?;
    for frame in &frames {
        release_files(paths, frame);
    }
    Ok(())
}

/// Persists a new frame ordering: positions 0..n in payload order. Frames
/// not named keep their positions.
pub fn reorder_frames(pool: &DbPool, order: &[i64]) -> Result<()> {
    if order.is_empty() {
        return Err(Error::Invalid("empty frame order".into()));
    }
    let mut conn = pool.get()?;
    db::update_frame_order(&mut conn, order)
}

fn release_files(paths: &AppPaths, frame: &FrameRecord) {
    if let Some(name) = &frame.image_path {
        best_effort_remove(&paths.upload_path(name));
    }
    if let Some(thumb) = frame.thumbnail_ref() {
        best_effort_remove(&thumb.resolve(paths));
    }
}

fn best_effort_remove(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(err) = std::fs::remove_file(path) {
        log::warn!("Error deleting file {}: {err}", path.display());
    }
}
