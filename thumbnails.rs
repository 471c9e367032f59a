use crate::models::SourceKind;
use image::imageops::FilterType;
use image::DynamicImage;

/// Uploads are bounded to this working resolution before persisting.
pub const MAX_UPLOAD_DIM: u32 = 1280;
/// Thumbnails are bounded to this resolution.
pub const THUMB_DIM: u32 = 300;

fn bounded(image: &DynamicImage, max_dim: u32) -> DynamicImage {
    if image.width() <= max_dim && image.height() <= max_dim {
        // Never upscale; callers get their own copy either way.
        return image.clone();
    }
    image.resize(max_dim, max_dim, FilterType::Lanczos3)
}

/// Produces the "original" bitmap to persist. Uploads are downscaled to fit
/// the working resolution; sketches are already canvas-bounded and pass
/// through at native size. The input is never mutated.
pub fn normalize(image: &DynamicImage, kind: SourceKind) -> DynamicImage {
    match kind {
        SourceKind::Upload => bounded(image, MAX_UPLOAD_DIM),
        SourceKind::Sketch => image.clone(),
    }
}

/// Derives a thumbnail from an already-normalized bitmap, as a copy so a
/// failure here can never corrupt the original.
pub fn thumbnail_of(image: &DynamicImage) -> DynamicImage {
    bounded(image, THUMB_DIM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::solid_image as solid;

    fn aspect(image: &DynamicImage) -> f64 {
        image.width() as f64 / image.height() as f64
    }

    #[test]
    fn upload_wider_than_bound_is_downscaled_preserving_aspect() {
        let src = solid(2560, 1440);
        let normalized = normalize(&src, SourceKind::Upload);
        assert!(normalized.width().max(normalized.height()) <= MAX_UPLOAD_DIM);
        assert!((aspect(&normalized) - aspect(&src)).abs() < 0.01);
        // input untouched
        assert_eq!(src.width(), 2560);
    }

    #[test]
    fn small_upload_is_not_upscaled() {
        let src = solid(640, 480);
        let normalized = normalize(&src, SourceKind::Upload);
        assert_eq!((normalized.width(), normalized.height()), (640, 480));
    }

    #[test]
    fn sketch_keeps_native_resolution() {
        let src = solid(2000, 500);
        let normalized = normalize(&src, SourceKind::Sketch);
        assert_eq!((normalized.width(), normalized.height()), (2000, 500));
    }

    #[test]
    fn thumbnail_is_bounded_and_aspect_preserving() {
        for (w, h) in [(1280, 720), (90, 200), (300, 300), (4000, 4000)] {
            let src = solid(w, h);
            let thumb = thumbnail_of(&src);
            assert!(thumb.width().max(thumb.height()) <= THUMB_DIM);
            if w <= THUMB_DIM && h <= THUMB_DIM {
                assert_eq!((thumb.width(), thumb.height()), (w, h));
            } else {
                assert!((aspect(&thumb) - aspect(&src)).abs() < 0.05);
            }
        }
    }
}
