use crate::error::{Error, Result};
use crate::models::{ImageSource, SourceKind};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::DynamicImage;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Whether an uploaded filename carries an accepted image extension.
pub fn allowed_file(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// A decoded bitmap plus the tag driving normalization and naming downstream.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub kind: SourceKind,
}

/// Turns either ingestion source into a bitmap. Failures come back as
/// `Error::Decode` values with no side effect; the caller owns the
/// degrade-gracefully policy (create the frame without an image).
pub fn decode(source: &ImageSource) -> Result<DecodedImage> {
    match source {
        ImageSource::Upload { filename, bytes } => decode_upload(filename, bytes),
        ImageSource::Sketch { data_url } => decode_sketch(data_url),
    }
}

fn decode_upload(filename: &str, bytes: &[u8]) -> Result<DecodedImage> {
    if !allowed_file(filename) {
        return Err(Error::Decode(format!(
            "unsupported upload extension: {filename}"
        )));
    }
    let image = image::load_from_memory(bytes)
        .map_err(|e| Error::Decode(format!("malformed upload {filename}: {e}")))?;
    Ok(DecodedImage {
        image,
        kind: SourceKind::Upload,
    })
}

/// Inline drawings arrive as `<prefix>,<base64 payload>`; the prefix is not
/// inspected beyond locating the first comma.
fn decode_sketch(data_url: &str) -> Result<DecodedImage> {
    let (_, encoded) = data_url
        .split_once(',')
        .ok_or_else(|| Error::Decode("sketch data has no comma separator".into()))?;
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| Error::Decode(format!("bad sketch base64: {e}")))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| Error::Decode(format!("malformed sketch pixels: {e}")))?;
    Ok(DecodedImage {
        image,
        kind: SourceKind::Sketch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::png_bytes;
    use base64::Engine as _;

    #[test]
    fn allowed_file_accepts_known_extensions_case_insensitively() {
        for name in ["a.png", "a.jpg", "a.jpeg", "a.gif", "A.PNG", "shot.JPeG"] {
            assert!(allowed_file(name), "{name}");
        }
        for name in ["a.bmp", "a.webp", "a.txt", "archive.tar.gz", "noext", "png"] {
            assert!(!allowed_file(name), "{name}");
        }
    }

    #[test]
    fn decodes_valid_upload() {
        let decoded = decode(&ImageSource::Upload {
            filename: "shot.png".into(),
            bytes: png_bytes(8, 6),
        })
        .unwrap();
        assert_eq!(decoded.kind, SourceKind::Upload);
        assert_eq!(decoded.image.width(), 8);
    }

    #[test]
    fn rejects_bad_extension_and_bad_pixels() {
        let err = decode(&ImageSource::Upload {
            filename: "shot.tiff".into(),
            bytes: png_bytes(2, 2),
        })
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));

        let err = decode(&ImageSource::Upload {
            filename: "shot.png".into(),
            bytes: vec![0, 1, 2, 3],
        })
        .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn decodes_sketch_data_url() {
        let payload = BASE64.encode(png_bytes(4, 4));
        let decoded = decode(&ImageSource::Sketch {
            data_url: format!("data:image/png;base64,{payload}"),
        })
        .unwrap();
        assert_eq!(decoded.kind, SourceKind::Sketch);
        assert_eq!(decoded.image.height(), 4);
    }

    #[test]
    fn sketch_failures_are_decode_errors() {
        for data_url in [
            "no-comma-here".to_string(),
            "data:image/png;base64,!!!not-base64!!!".to_string(),
            format!("data:image/png;base64,{}", BASE64.encode(b"not pixels")),
        ] {
            let err = decode(&ImageSource::Sketch { data_url }).unwrap_err();
            assert!(matches!(err, Error::Decode(_)));
        }
    }
}
