use crate::config::AppPaths;
use crate::db;
use crate::error::{Error, Result};
use crate::fonts::DocFont;
use crate::models::FrameRecord;
use image::ImageOutputFormat;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str};
use rusqlite::Connection;
use std::io::Cursor;

/// Download name and MIME type the delivery layer attaches to an export.
pub const EXPORT_FILENAME: &str = "project_storyboard.pdf";
pub const EXPORT_MIME: &str = "application/pdf";

// A4 page in points (1/72 inch) and the layout constants of the document.
const PAGE_WIDTH_PT: f32 = 595.0;
const PAGE_HEIGHT_PT: f32 = 842.0;
const MARGIN_PT: f32 = 72.0;
const BODY_SIZE: f32 = 12.0;
const BODY_LEADING: f32 = 15.0;
const TITLE_SIZE: f32 = 16.0;
const TITLE_LEADING: f32 = 20.0;
const TITLE_SPACER: f32 = 12.0;
const IMAGE_SPACER: f32 = 6.0;
const BLOCK_SPACER: f32 = 24.0;
const IMAGE_BOX_PT: f32 = 504.0; // 7 inches
const JPEG_QUALITY: u8 = 85;

/// Scaled draw dimensions preserving aspect ratio inside a bounding box.
pub fn fit_image(
    orig_width: f64,
    orig_height: f64,
    max_width: f64,
    max_height: f64,
) -> Result<(f64, f64)> {
    if orig_width <= 0.0 || orig_height <= 0.0 || max_width <= 0.0 || max_height <= 0.0 {
        return Err(Error::Layout(format!(
            "non-positive fit dimensions: {orig_width}x{orig_height} into {max_width}x{max_height}"
        )));
    }
    let ratio = (max_width / orig_width).min(max_height / orig_height);
    Ok((orig_width * ratio, orig_height * ratio))
}

/// Renders a project's frames, ordered by position, into a paginated A4
/// document. A missing project is `NotFound`; per-frame image trouble is
/// localized to a placeholder line and never fails the export.
pub fn export_project(conn: &Connection, paths: &AppPaths, project_id: i64) -> Result<Vec<u8>> {
    let project = db::get_project(conn, project_id)?
        .ok_or_else(|| Error::NotFound(format!("project {project_id}")))?;
    let frames = db::list_frames(conn, project_id)?;
    let font = DocFont::load(paths);
    Ok(compose(&project.name, &frames, paths, &font))
}

enum Piece {
    Line {
        text: String,
        size: f32,
        leading: f32,
    },
    Image {
        jpeg: Vec<u8>,
        px_width: u32,
        px_height: u32,
        draw_width: f32,
        draw_height: f32,
    },
    Spacer(f32),
}

impl Piece {
    fn height(&self) -> f32 {
        match self {
            Piece::Line { leading, .. } => *leading,
            Piece::Image { draw_height, .. } => *draw_height,
            Piece::Spacer(v) => *v,
        }
    }
}

/// A non-splittable group: caption lines plus an optional fitted image. Moves
/// to the next page whole when it does not fit the remaining space.
struct Block {
    pieces: Vec<Piece>,
}

impl Block {
    fn height(&self) -> f32 {
        self.pieces.iter().map(Piece::height).sum()
    }
}

fn compose(project_name: &str, frames: &[FrameRecord], paths: &AppPaths, font: &DocFont) -> Vec<u8> {
    let column = PAGE_WIDTH_PT - 2.0 * MARGIN_PT;

    let mut title = Block { pieces: Vec::new() };
    push_wrapped(
        &mut title.pieces,
        font,
        &format!("Project: {project_name}"),
        TITLE_SIZE,
        TITLE_LEADING,
        column,
    );
    title.pieces.push(Piece::Spacer(TITLE_SPACER));

    let mut blocks = vec![title];
    for frame in frames {
        blocks.push(frame_block(frame, paths, font, column));
    }

    emit(&blocks, font)
}

fn frame_block(frame: &FrameRecord, paths: &AppPaths, font: &DocFont, column: f32) -> Block {
    let mut pieces = Vec::new();
    let mut caption = |text: &str| {
        push_wrapped(&mut pieces, font, text, BODY_SIZE, BODY_LEADING, column);
    };

    caption(&format!("Frame: {}", frame.description));
    if let Some(character) = nonempty(frame.character_name.as_deref()) {
        caption(&format!("Character: {character}"));
    }
    if let Some(shoot_time) = nonempty(frame.shoot_time.as_deref()) {
        caption(&format!("Time: {shoot_time}"));
    }
    if let Some(location) = nonempty(frame.location.as_deref()) {
        caption(&format!("Location: {location}"));
    }

    match frame_image(frame, paths, column) {
        Ok(Some(image)) => {
            pieces.push(Piece::Spacer(IMAGE_SPACER));
            pieces.push(image);
        }
        Ok(None) => {}
        Err(note) => {
            log::warn!(
                "Export placeholder for frame {:?}: {note}",
                frame.id.unwrap_or_default()
            );
            push_wrapped(&mut pieces, font, &note, BODY_SIZE, BODY_LEADING, column);
        }
    }
    pieces.push(Piece::Spacer(BLOCK_SPACER));

    Block { pieces }
}

/// Loads and fits a frame's image. `Ok(None)` means no image attached; the
/// error string is the visible placeholder for a missing or unreadable file.
fn frame_image(
    frame: &FrameRecord,
    paths: &AppPaths,
    column: f32,
) -> std::result::Result<Option<Piece>, String> {
    let Some(name) = frame.image_path.as_deref() else {
        return Ok(None);
    };
    let path = paths.upload_path(name);
    if !path.exists() {
        return Err(format!("[Image missing: {name}]"));
    }
    let image = image::open(&path).map_err(|e| format!("[Image error: {e}]"))?;

    let rgb = image.to_rgb8();
    let (px_width, px_height) = rgb.dimensions();
    let (draw_width, draw_height) = fit_image(
        f64::from(px_width),
        f64::from(px_height),
        f64::from(IMAGE_BOX_PT.min(column)),
        f64::from(IMAGE_BOX_PT),
    )
    .map_err(|e| format!("[Image error: {e}]"))?;

    let mut jpeg = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(|e| format!("[Image error: {e}]"))?;

    Ok(Some(Piece::Image {
        jpeg,
        px_width,
        px_height,
        draw_width: draw_width as f32,
        draw_height: draw_height as f32,
    }))
}

fn nonempty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Greedy word wrap against the active font's advance widths. A single word
/// wider than the column gets its own overflowing line rather than breaking.
fn wrap_text(font: &DocFont, text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if font.text_width(&candidate, size) <= max_width || current.is_empty() {
            current = candidate;
        } else {
            lines.push(current);
            current = word.to_string();
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn push_wrapped(
    pieces: &mut Vec<Piece>,
    font: &DocFont,
    text: &str,
    size: f32,
    leading: f32,
    max_width: f32,
) {
    for line in wrap_text(font, text, size, max_width) {
        pieces.push(Piece::Line {
            text: line,
            size,
            leading,
        });
    }
}

/// Distributes blocks over pages: a block that does not fit the remaining
/// space starts the next page; an over-tall block gets a page of its own.
fn paginate(blocks: &[Block]) -> Vec<Vec<&Block>> {
    let usable = PAGE_HEIGHT_PT - 2.0 * MARGIN_PT;
    let mut pages: Vec<Vec<&Block>> = vec![Vec::new()];
    let mut remaining = usable;
    for block in blocks {
        let height = block.height();
        if height > remaining && !pages.last().map(|p| p.is_empty()).unwrap_or(true) {
            pages.push(Vec::new());
            remaining = usable;
        }
        remaining -= height;
        pages.last_mut().unwrap().push(block);
    }
    pages
}

fn emit(blocks: &[Block], font: &DocFont) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let mut ref_counter = std::iter::successors(Some(1), |n| Some(n + 1));

    let catalog_ref = Ref::new(ref_counter.next().unwrap());
    let page_tree_ref = Ref::new(ref_counter.next().unwrap());
    let font_ref = Ref::new(ref_counter.next().unwrap());
    pdf.catalog(catalog_ref).pages(page_tree_ref);
    font.write(&mut pdf, font_ref, &mut ref_counter);

    let pages = paginate(blocks);
    let page_refs: Vec<Ref> = pages
        .iter()
        .map(|_| Ref::new(ref_counter.next().unwrap()))
        .collect();

    for (page_blocks, page_ref) in pages.iter().zip(&page_refs) {
        emit_page(
            &mut pdf,
            &mut ref_counter,
            *page_ref,
            page_tree_ref,
            font_ref,
            page_blocks,
            font,
        );
    }

    pdf.pages(page_tree_ref)
        .kids(page_refs.iter().copied())
        .count(pages.len() as i32);

    pdf.finish()
}

fn emit_page(
    pdf: &mut Pdf,
    ref_counter: &mut dyn Iterator<Item = i32>,
    page_ref: Ref,
    page_tree_ref: Ref,
    font_ref: Ref,
    blocks: &[&Block],
    font: &DocFont,
) {
    let content_ref = Ref::new(ref_counter.next().unwrap());

    // One XObject per image on the page, named Im<n> in page resources.
    let mut images: Vec<(String, Ref, &Piece)> = Vec::new();
    for block in blocks {
        for piece in &block.pieces {
            if matches!(piece, Piece::Image { .. }) {
                let image_ref = Ref::new(ref_counter.next().unwrap());
                images.push((format!("Im{}", image_ref.get()), image_ref, piece));
            }
        }
    }

    let mut page = pdf.page(page_ref);
    page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH_PT, PAGE_HEIGHT_PT));
    page.parent(page_tree_ref);
    page.contents(content_ref);
    let mut resources = page.resources();
    resources.fonts().pair(Name(b"F1"), font_ref);
    let mut x_objects = resources.x_objects();
    for (name, image_ref, _) in &images {
        x_objects.pair(Name(name.as_bytes()), *image_ref);
    }
    x_objects.finish();
    resources.finish();
    page.finish();

    let mut content = Content::new();
    let mut cursor = PAGE_HEIGHT_PT - MARGIN_PT;
    let mut image_idx = 0usize;
    for block in blocks {
        for piece in &block.pieces {
            match piece {
                Piece::Line { text, size, leading } => {
                    let baseline = cursor - size;
                    content.begin_text();
                    content.set_font(Name(b"F1"), *size);
                    content.set_text_matrix([1.0, 0.0, 0.0, 1.0, MARGIN_PT, baseline]);
                    content.show(Str(&font.encode(text)));
                    content.end_text();
                    cursor -= leading;
                }
                Piece::Image {
                    draw_width,
                    draw_height,
                    ..
                } => {
                    cursor -= draw_height;
                    let name = &images[image_idx].0;
                    content.save_state();
                    content.transform([*draw_width, 0.0, 0.0, *draw_height, MARGIN_PT, cursor]);
                    content.x_object(Name(name.as_bytes()));
                    content.restore_state();
                    image_idx += 1;
                }
                Piece::Spacer(v) => cursor -= v,
            }
        }
    }
    pdf.stream(content_ref, &content.finish());

    for (_, image_ref, piece) in &images {
        let Piece::Image {
            jpeg,
            px_width,
            px_height,
            ..
        } = *piece
        else {
            continue;
        };
        let mut image_xobject = pdf.image_xobject(*image_ref, jpeg);
        image_xobject.filter(Filter::DctDecode);
        image_xobject.width(*px_width as i32);
        image_xobject.height(*px_height as i32);
        image_xobject.color_space().device_rgb();
        image_xobject.bits_per_component(8);
        image_xobject.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_project, create_user, init_database, insert_frame};
    use crate::models::FrameRecord;
    use crate::testutil::png_bytes;

    #[test]
    fn fit_produces_tight_aspect_preserving_dimensions() {
        for (w, h, max_w, max_h) in [
            (1920.0, 1080.0, 504.0, 504.0),
            (100.0, 400.0, 504.0, 504.0),
            (50.0, 50.0, 504.0, 300.0),
        ] {
            let (dw, dh) = fit_image(w, h, max_w, max_h).unwrap();
            assert!((dw / max_w).max(dh / max_h) <= 1.0 + 1e-9);
            let tight = (dw - max_w).abs() < 1e-6 || (dh - max_h).abs() < 1e-6;
            assert!(tight, "{w}x{h} -> {dw}x{dh}");
            assert!((dw / dh - w / h).abs() < 1e-9);
        }
    }

    #[test]
    fn fit_rejects_non_positive_dimensions() {
        for (w, h, max_w, max_h) in [
            (0.0, 10.0, 504.0, 504.0),
            (10.0, -1.0, 504.0, 504.0),
            (10.0, 10.0, 0.0, 504.0),
        ] {
            assert!(matches!(
                fit_image(w, h, max_w, max_h),
                Err(Error::Layout(_))
            ));
        }
    }

    #[test]
    fn wrap_respects_column_width() {
        let font = DocFont::Builtin;
        let text = "a long caption that certainly does not fit a narrow column at all";
        let lines = wrap_text(&font, text, 12.0, 100.0);
        assert!(lines.len() > 1);
        for line in &lines {
            // Only a single oversized word may overflow; none exist here.
            assert!(font.text_width(line, 12.0) <= 100.0, "{line}");
        }
        assert_eq!(lines.join(" "), text);
    }

    fn store_with_project() -> (tempfile::TempDir, crate::db::DbPool, AppPaths, i64) {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::at(dir.path()).unwrap();
        let pool = init_database(&paths).unwrap();
        let project_id = {
            let conn = pool.get().unwrap();
            let user_id = create_user(&conn, "u").unwrap();
            create_project(&conn, user_id, "Springtime").unwrap()
        };
        (dir, pool, paths, project_id)
    }

    fn frame(project_id: i64, description: &str, position: i64) -> FrameRecord {
        FrameRecord {
            project_id,
            description: description.into(),
            position,
            ..Default::default()
        }
    }

    #[test]
    fn missing_project_is_not_found() {
        let (_dir, pool, paths, _) = store_with_project();
        let conn = pool.get().unwrap();
        assert!(matches!(
            export_project(&conn, &paths, 9999),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn export_orders_blocks_by_position() {
        let (_dir, pool, paths, project_id) = store_with_project();
        let conn = pool.get().unwrap();
        // Insertion order deliberately disagrees with position order.
        insert_frame(&conn, &frame(project_id, "gamma", 2)).unwrap();
        insert_frame(&conn, &frame(project_id, "alpha", 0)).unwrap();
        insert_frame(&conn, &frame(project_id, "beta", 1)).unwrap();

        let bytes = export_project(&conn, &paths, project_id).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        // Builtin Helvetica keeps caption text literal in the content stream.
        let find = |needle: &str| {
            bytes
                .windows(needle.len())
                .position(|w| w == needle.as_bytes())
                .unwrap_or_else(|| panic!("{needle} not in document"))
        };
        let title = find("Project: Springtime");
        let a = find("Frame: alpha");
        let b = find("Frame: beta");
        let c = find("Frame: gamma");
        assert!(title < a && a < b && b < c);
    }

    #[test]
    fn missing_image_file_yields_placeholder_not_failure() {
        let (_dir, pool, paths, project_id) = store_with_project();
        let conn = pool.get().unwrap();
        let mut with_ghost = frame(project_id, "ghost", 0);
        with_ghost.image_path = Some("vanished.png".into());
        insert_frame(&conn, &with_ghost).unwrap();

        let bytes = export_project(&conn, &paths, project_id).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Frame: ghost"));
        assert!(text.contains("Image missing: vanished.png"));
    }

    #[test]
    fn export_embeds_attached_images_and_optional_captions() {
        let (_dir, pool, paths, project_id) = store_with_project();
        let conn = pool.get().unwrap();

        std::fs::write(paths.upload_path("shot.png"), png_bytes(40, 30)).unwrap();
        let mut full = frame(project_id, "full shot", 0);
        full.image_path = Some("shot.png".into());
        full.character_name = Some("Lena".into());
        full.shoot_time = Some("  ".into()); // blank: must not render
        full.location = Some("rooftop".into());
        insert_frame(&conn, &full).unwrap();

        let bytes = export_project(&conn, &paths, project_id).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Character: Lena"));
        assert!(text.contains("Location: rooftop"));
        assert!(!text.contains("Time:"));
        // JPEG-compressed image stream present.
        assert!(text.contains("DCTDecode"));
    }

    #[test]
    fn many_blocks_paginate_without_splitting() {
        let (_dir, pool, paths, project_id) = store_with_project();
        let conn = pool.get().unwrap();
        for i in 0..60 {
            insert_frame(&conn, &frame(project_id, &format!("shot {i}"), i)).unwrap();
        }
        let bytes = export_project(&conn, &paths, project_id).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        // 60 caption blocks cannot fit one A4 page; each page carries its own
        // MediaBox entry.
        let page_count = text.matches("MediaBox").count();
        assert!(page_count > 1, "expected multiple pages, got {page_count}");
    }
}
