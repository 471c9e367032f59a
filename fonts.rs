use crate::config::AppPaths;
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo};
use pdf_writer::{Name, Pdf, Rect, Ref, Str};
use std::collections::HashMap;

/// Font file looked up under `AppPaths::fonts_dir` for export.
pub const DEFAULT_FONT_FILE: &str = "DejaVuSans.ttf";

/// The single font used for every text run of an exported document. When a
/// TrueType file is available it is embedded whole (Type0/Identity-H, full
/// Unicode working set); otherwise the builtin Helvetica base font carries
/// WinAnsi text.
pub enum DocFont {
    Builtin,
    Embedded(EmbeddedFont),
}

pub struct EmbeddedFont {
    data: Vec<u8>,
    units_per_em: f32,
    num_glyphs: u16,
    cmap: HashMap<char, u16>,
    advances: Vec<u16>,
    ascent: i16,
    descent: i16,
    cap_height: i16,
    bbox: [i16; 4],
    base_name: String,
}

impl DocFont {
    pub fn load(paths: &AppPaths) -> DocFont {
        let path = paths.resolve_font(DEFAULT_FONT_FILE);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(_) => {
                log::info!(
                    "No font file at {}; exporting with builtin Helvetica",
                    path.display()
                );
                return DocFont::Builtin;
            }
        };
        match EmbeddedFont::parse(data) {
            Ok(font) => {
                log::info!("Embedding {} from {}", font.base_name, path.display());
                DocFont::Embedded(font)
            }
            Err(err) => {
                log::warn!(
                    "Font {} unusable ({err}); falling back to builtin Helvetica",
                    path.display()
                );
                DocFont::Builtin
            }
        }
    }

    /// Advance width of `text` at `size` points, used for wrapping and block
    /// height computation.
    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        match self {
            DocFont::Builtin => {
                let units: u32 = text.chars().map(helvetica_width).map(u32::from).sum();
                units as f32 * size / 1000.0
            }
            DocFont::Embedded(font) => {
                let units: u32 = text
                    .chars()
                    .map(|c| {
                        let gid = font.glyph(c);
                        u32::from(*font.advances.get(gid as usize).unwrap_or(&0))
                    })
                    .sum();
                units as f32 * size / font.units_per_em
            }
        }
    }

    /// Encodes a text run into the byte string the content stream shows:
    /// WinAnsi-compatible bytes for the builtin font, big-endian glyph ids
    /// for the embedded Identity-H font.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            DocFont::Builtin => text
                .chars()
                .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
                .collect(),
            DocFont::Embedded(font) => {
                let mut bytes = Vec::with_capacity(text.len() * 2);
                for c in text.chars() {
                    bytes.extend_from_slice(&font.glyph(c).to_be_bytes());
                }
                bytes
            }
        }
    }

    /// Writes the font objects under `font_ref`, allocating any extra
    /// indirect objects from `ref_counter`.
    pub fn write(
        &self,
        pdf: &mut Pdf,
        font_ref: Ref,
        ref_counter: &mut dyn Iterator<Item = i32>,
    ) {
        match self {
            DocFont::Builtin => {
                pdf.type1_font(font_ref)
                    .base_font(Name(b"Helvetica"))
                    .encoding_predefined(Name(b"WinAnsiEncoding"));
            }
            DocFont::Embedded(font) => font.write(pdf, font_ref, ref_counter),
        }
    }
}

impl EmbeddedFont {
    fn parse(data: Vec<u8>) -> Result<Self, String> {
        let face = ttf_parser::Face::parse(&data, 0).map_err(|e| e.to_string())?;

        let mut cmap = HashMap::new();
        if let Some(table) = face.tables().cmap {
            for subtable in table.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|cp| {
                    if let (Some(c), Some(gid)) = (char::from_u32(cp), subtable.glyph_index(cp)) {
                        cmap.entry(c).or_insert(gid.0);
                    }
                });
            }
        }
        if cmap.is_empty() {
            return Err("font has no unicode cmap".into());
        }

        let num_glyphs = face.number_of_glyphs();
        let advances = (0..num_glyphs)
            .map(|gid| face.glyph_hor_advance(ttf_parser::GlyphId(gid)).unwrap_or(0))
            .collect();

        let base_name = face
            .names()
            .into_iter()
            .find(|n| n.name_id == ttf_parser::name_id::POST_SCRIPT_NAME && n.is_unicode())
            .and_then(|n| n.to_string())
            .unwrap_or_else(|| "EmbeddedFont".to_string());

        let bounds = face.global_bounding_box();
        let units_per_em = f32::from(face.units_per_em());
        let ascent = face.ascender();
        let descent = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascent);
        drop(face);

        Ok(Self {
            units_per_em,
            num_glyphs,
            cmap,
            advances,
            ascent,
            descent,
            cap_height,
            bbox: [bounds.x_min, bounds.y_min, bounds.x_max, bounds.y_max],
            base_name,
            data,
        })
    }

    fn glyph(&self, c: char) -> u16 {
        self.cmap.get(&c).copied().unwrap_or(0)
    }

    // Glyph-space values in the descriptor are expressed in 1000ths of an em.
    fn em(&self, value: i16) -> f32 {
        f32::from(value) * 1000.0 / self.units_per_em
    }

    fn write(&self, pdf: &mut Pdf, font_ref: Ref, ref_counter: &mut dyn Iterator<Item = i32>) {
        let cid_ref = Ref::new(ref_counter.next().unwrap());
        let descriptor_ref = Ref::new(ref_counter.next().unwrap());
        let data_ref = Ref::new(ref_counter.next().unwrap());
        let name = Name(self.base_name.as_bytes());

        pdf.type0_font(font_ref)
            .base_font(name)
            .encoding_predefined(Name(b"Identity-H"))
            .descendant_font(cid_ref);

        let mut cid = pdf.cid_font(cid_ref);
        cid.subtype(CidFontType::Type2)
            .base_font(name)
            .system_info(SystemInfo {
                registry: Str(b"Adobe"),
                ordering: Str(b"Identity"),
                supplement: 0,
            })
            .font_descriptor(descriptor_ref)
            .default_width(0.0)
            .cid_to_gid_map_predefined(Name(b"Identity"));
        cid.widths().consecutive(
            0,
            (0..self.num_glyphs).map(|gid| {
                f32::from(self.advances[gid as usize]) * 1000.0 / self.units_per_em
            }),
        );
        drop(cid);

        pdf.font_descriptor(descriptor_ref)
            .name(name)
            .flags(FontFlags::NON_SYMBOLIC)
            .bbox(Rect::new(
                self.em(self.bbox[0]),
                self.em(self.bbox[1]),
                self.em(self.bbox[2]),
                self.em(self.bbox[3]),
            ))
            .italic_angle(0.0)
            .ascent(self.em(self.ascent))
            .descent(self.em(self.descent))
            .cap_height(self.em(self.cap_height))
            .stem_v(80.0)
            .font_file2(data_ref);

        let mut stream = pdf.stream(data_ref, &self.data);
        stream.pair(Name(b"Length1"), self.data.len() as i32);
    }
}

/// Standard Helvetica advance widths (1000ths of an em) for ASCII 32..=126;
/// everything else measures as a default letter width. Only wrapping and
/// pagination read these.
fn helvetica_width(c: char) -> u16 {
    const WIDTHS: [u16; 95] = [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
        1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
        333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
        556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
    ];
    let code = c as u32;
    if (32..=126).contains(&code) {
        WIDTHS[(code - 32) as usize]
    } else {
        556
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_measures_with_helvetica_metrics() {
        let font = DocFont::Builtin;
        // 'W' is the widest letter; width scales linearly with size.
        assert!(font.text_width("W", 12.0) > font.text_width("i", 12.0));
        let w = font.text_width("Frame", 12.0);
        assert!((font.text_width("Frame", 24.0) - 2.0 * w).abs() < 1e-3);
        assert!(w > 0.0);
    }

    #[test]
    fn builtin_encodes_latin1_and_substitutes_the_rest() {
        let font = DocFont::Builtin;
        assert_eq!(font.encode("Ab"), vec![b'A', b'b']);
        assert_eq!(font.encode("é"), vec![0xE9]);
        assert_eq!(font.encode("Я"), vec![b'?']);
    }

    #[test]
    fn missing_font_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let paths = crate::config::AppPaths::at(dir.path()).unwrap();
        assert!(matches!(DocFont::load(&paths), DocFont::Builtin));
    }

    #[test]
    fn garbage_font_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let paths = crate::config::AppPaths::at(dir.path()).unwrap();
        std::fs::write(paths.fonts_dir.join(DEFAULT_FONT_FILE), b"not a font").unwrap();
        assert!(matches!(DocFont::load(&paths), DocFont::Builtin));
    }
}
